//! ESRI ASCII grid reader.

use std::path::{Path, PathBuf};

use scarp_raster::{Crs, GridSpec, Raster};
use tracing::{debug, info, instrument};

use crate::IoError;

const HEADER_KEYS: [&str; 9] = [
    "ncols",
    "nrows",
    "xllcorner",
    "xllcenter",
    "yllcorner",
    "yllcenter",
    "cellsize",
    "nodata_value",
    "crs",
];

/// Reads a raster from an ESRI ASCII grid file.
///
/// Expected layout:
/// - header lines `ncols`, `nrows`, `xllcorner`|`xllcenter`,
///   `yllcorner`|`yllcenter`, `cellsize`, optional `NODATA_value`
/// - optional `crs EPSG:<code>` line (EPSG:4326 when absent)
/// - `nrows × ncols` whitespace-separated values, northernmost row first
///
/// Cells equal to the no-data value become no-data.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::InvalidHeader`] | Missing, duplicated or unparseable header field |
/// | [`IoError::EmptyDataset`] | No cell values after the header |
/// | [`IoError::InvalidValue`] | A cell is not a number |
/// | [`IoError::Raster`] | Cell count differs from `nrows × ncols`, or bad geometry |
pub struct RasterReader {
    path: PathBuf,
}

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x: Option<(f64, bool)>,
    y: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
    crs: Option<Crs>,
}

impl RasterReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Raster, IoError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        let mut header = Header::default();
        let mut lines = text.lines().peekable();
        while let Some(&line) = lines.peek() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                lines.next();
                continue;
            };
            let key = key.to_ascii_lowercase();
            if !HEADER_KEYS.contains(&key.as_str()) {
                break;
            }
            let value = tokens.next().ok_or_else(|| self.header_error(format!("{key} has no value")))?;
            self.set_field(&mut header, &key, value)?;
            lines.next();
        }

        let (rows, cols, west, north, cell_size, crs) = self.resolve(&header)?;
        debug!(rows, cols, cell_size, crs = %crs, "raster header parsed");

        let nodata = header.nodata;
        let mut data = Vec::with_capacity(rows * cols);
        for (record, raw) in lines.flat_map(str::split_whitespace).enumerate() {
            let value: f64 = raw.parse().map_err(|_| IoError::InvalidValue {
                path: self.path.clone(),
                record,
                raw: raw.to_string(),
            })?;
            let is_nodata = nodata.is_some_and(|nd| value == nd);
            data.push(if is_nodata { f64::NAN } else { value });
        }
        if data.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let raster = GridSpec::new(rows, cols, west, north, cell_size, crs)
            .and_then(|spec| Raster::new(spec, data))
            .map_err(|source| IoError::Raster {
                path: self.path.clone(),
                source,
            })?;
        info!(
            rows,
            cols,
            valid = raster.valid_count(),
            "raster loaded"
        );
        Ok(raster)
    }

    fn set_field(&self, header: &mut Header, key: &str, raw: &str) -> Result<(), IoError> {
        let number = || {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| self.header_error(format!("{key} value \"{raw}\" is not a finite number")))
        };
        let count = || {
            raw.parse::<usize>()
                .map_err(|_| self.header_error(format!("{key} value \"{raw}\" is not a count")))
        };
        let duplicated = match key {
            "ncols" => header.ncols.replace(count()?).is_some(),
            "nrows" => header.nrows.replace(count()?).is_some(),
            "xllcorner" => header.x.replace((number()?, false)).is_some(),
            "xllcenter" => header.x.replace((number()?, true)).is_some(),
            "yllcorner" => header.y.replace((number()?, false)).is_some(),
            "yllcenter" => header.y.replace((number()?, true)).is_some(),
            "cellsize" => header.cellsize.replace(number()?).is_some(),
            "nodata_value" => header.nodata.replace(number()?).is_some(),
            _ => {
                let crs = raw
                    .parse::<Crs>()
                    .map_err(|e| self.header_error(e.to_string()))?;
                header.crs.replace(crs).is_some()
            }
        };
        if duplicated {
            return Err(self.header_error(format!("{key} given twice")));
        }
        Ok(())
    }

    fn resolve(&self, h: &Header) -> Result<(usize, usize, f64, f64, f64, Crs), IoError> {
        let missing = |name: &str| self.header_error(format!("missing {name}"));
        let cols = h.ncols.ok_or_else(|| missing("ncols"))?;
        let rows = h.nrows.ok_or_else(|| missing("nrows"))?;
        let cell_size = h.cellsize.ok_or_else(|| missing("cellsize"))?;
        let (x, x_center) = h.x.ok_or_else(|| missing("xllcorner"))?;
        let (y, y_center) = h.y.ok_or_else(|| missing("yllcorner"))?;
        let west = if x_center { x - cell_size / 2.0 } else { x };
        let south = if y_center { y - cell_size / 2.0 } else { y };
        let north = south + rows as f64 * cell_size;
        Ok((rows, cols, west, north, cell_size, h.crs.unwrap_or(Crs::WGS84)))
    }

    fn header_error(&self, reason: String) -> IoError {
        IoError::InvalidHeader {
            path: self.path.clone(),
            reason,
        }
    }
}
