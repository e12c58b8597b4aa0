//! Result writer for rasters, validation reports and district tables.

use std::fs;
use std::path::{Path, PathBuf};

use scarp_raster::Raster;
use scarp_validate::{ComparisonReport, DistrictStats, NationalStats};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Preferred no-data marker for ASCII grids.
pub const ASCII_NODATA: f64 = -9999.0;

/// Writes pipeline outputs under one directory, prefixed by experiment name.
///
/// Creates the output directory on construction if it does not exist.
/// JSON artifacts land in `{experiment}_{artifact}.json`, rasters in
/// `{experiment}_{artifact}.asc`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write `result` wrapped as `{experiment, artifact, result}`.
    ///
    /// # Errors
    ///
    /// - [`IoError::Serialize`] if `result` cannot be encoded
    /// - [`IoError::WriteFile`] if the file cannot be written
    #[instrument(skip(self, result))]
    pub fn write_json<T: Serialize>(&self, artifact: &str, result: &T) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(artifact, "json");
        let envelope = Envelope {
            experiment: self.experiment.as_str(),
            artifact,
            result,
        };
        let json = serde_json::to_string_pretty(&envelope).map_err(|e| IoError::Serialize {
            artifact: artifact.to_string(),
            source: e,
        })?;
        write_file(&path, json.as_bytes())?;
        info!(path = %path.display(), "{artifact} written");
        Ok(path)
    }

    /// Write both validation scopes to `{experiment}_validation.json`.
    ///
    /// # Errors
    ///
    /// See [`ResultWriter::write_json`].
    pub fn write_validation(&self, report: &ComparisonReport) -> Result<PathBuf, IoError> {
        self.write_json("validation", report)
    }

    /// Write per-district rows and the national summary to
    /// `{experiment}_districts.json`.
    ///
    /// # Errors
    ///
    /// See [`ResultWriter::write_json`].
    pub fn write_districts(
        &self,
        districts: &[DistrictStats],
        national: &NationalStats,
    ) -> Result<PathBuf, IoError> {
        self.write_json(
            "districts",
            &DistrictArtifact {
                national,
                districts,
            },
        )
    }

    /// Write `raster` as an ESRI ASCII grid to `{experiment}_{artifact}.asc`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    pub fn write_raster(&self, artifact: &str, raster: &Raster) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(artifact, "asc");
        write_ascii_grid(&path, raster)?;
        Ok(path)
    }

    /// `{output_dir}/{experiment}_model.bin`; nothing is written.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.artifact_path("model", "bin")
    }

    fn artifact_path(&self, artifact: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{artifact}.{extension}", self.experiment.as_str()))
    }
}

/// Write `raster` as an ESRI ASCII grid with a trailing `crs` header line.
///
/// No-data pixels are written as [`ASCII_NODATA`], or as the first value
/// below it that no valid pixel holds, so the grid reads back unchanged.
///
/// # Errors
///
/// Returns [`IoError::WriteFile`] if the file cannot be written.
#[instrument(skip(raster), fields(path = %path.display(), grid = %raster.spec()))]
pub fn write_ascii_grid(path: &Path, raster: &Raster) -> Result<(), IoError> {
    let spec = raster.spec();
    let nodata = nodata_marker(raster);
    let mut out = String::with_capacity(spec.len() * 8 + 128);
    out.push_str(&format!(
        "ncols {}\nnrows {}\nxllcorner {}\nyllcorner {}\ncellsize {}\nNODATA_value {nodata}\ncrs {}\n",
        spec.cols(),
        spec.rows(),
        spec.west(),
        spec.south(),
        spec.cell_size(),
        spec.crs(),
    ));
    for row in 0..spec.rows() {
        let line: Vec<String> = (0..spec.cols())
            .map(|col| raster.get(row, col).unwrap_or(nodata).to_string())
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    write_file(path, out.as_bytes())?;
    info!(valid = raster.valid_count(), nodata, "raster written");
    Ok(())
}

/// [`ASCII_NODATA`], stepped down by one until no valid pixel equals it.
fn nodata_marker(raster: &Raster) -> f64 {
    let mut nodata = ASCII_NODATA;
    while raster.valid_values().any(|v| v == nodata) {
        nodata -= 1.0;
    }
    if nodata != ASCII_NODATA {
        debug!(nodata, "data holds {ASCII_NODATA}; using another no-data marker");
    }
    nodata
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    fs::write(path, bytes).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    experiment: &'a str,
    artifact: &'a str,
    result: &'a T,
}

#[derive(Serialize)]
struct DistrictArtifact<'a> {
    national: &'a NationalStats,
    districts: &'a [DistrictStats],
}
