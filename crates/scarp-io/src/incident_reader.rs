//! CSV incident reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scarp_validate::Incident;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::IoError;

/// One CSV row; empty impact cells read as zero, an empty year as undated.
#[derive(Debug, Deserialize)]
struct IncidentRow {
    id: String,
    lon: String,
    lat: String,
    deaths: Option<u32>,
    injured: Option<u32>,
    missing: Option<u32>,
    affected: Option<u32>,
    infrastructure_destroyed: Option<u32>,
    year: Option<i32>,
}

/// Reads landslide incidents from a CSV file.
///
/// Expected CSV format:
/// - Header `id,lon,lat,deaths,injured,missing,affected,infrastructure_destroyed,year`
/// - One row per incident; impact columns and `year` may be empty
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed record or missing column |
/// | [`IoError::InvalidValue`] | `lon`/`lat` is not a finite number |
/// | [`IoError::DuplicateIncidentId`] | Same id appears twice |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
pub struct IncidentReader {
    path: PathBuf,
}

impl IncidentReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<Incident>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut incidents = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (row_index, result) in rdr.deserialize::<IncidentRow>().enumerate() {
            let row = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            if let Some(&first_row) = seen.get(&row.id) {
                return Err(IoError::DuplicateIncidentId {
                    path: self.path.clone(),
                    id: row.id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(row.id.clone(), row_index);

            let lon = self.coordinate(&row.lon, row_index)?;
            let lat = self.coordinate(&row.lat, row_index)?;
            incidents.push(Incident {
                id: row.id,
                lon,
                lat,
                deaths: row.deaths.unwrap_or(0),
                injured: row.injured.unwrap_or(0),
                missing: row.missing.unwrap_or(0),
                affected: row.affected.unwrap_or(0),
                infrastructure_destroyed: row.infrastructure_destroyed.unwrap_or(0),
                year: row.year,
            });
        }

        if incidents.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }
        let undated = incidents.iter().filter(|i| i.year.is_none()).count();
        debug!(undated, "incident years checked");
        info!(n_incidents = incidents.len(), "incidents loaded");
        Ok(incidents)
    }

    fn coordinate(&self, raw: &str, record: usize) -> Result<f64, IoError> {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| IoError::InvalidValue {
                path: self.path.clone(),
                record,
                raw: raw.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str = "id,lon,lat,deaths,injured,missing,affected,infrastructure_destroyed,year\n";

    fn write_temp(rows: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(HEADER.as_bytes()).unwrap();
        f.write_all(rows.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_rows_with_empty_cells() {
        let f = write_temp("a,85.3,27.7,2,,0,10,1,2019\nb,84.1,28.2,,,,,,\n");
        let incidents = IncidentReader::new(f.path()).read().unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].deaths, 2);
        assert_eq!(incidents[0].injured, 0);
        assert_eq!(incidents[0].year, Some(2019));
        assert!(incidents[0].is_damaging());
        assert_eq!(incidents[1].year, None);
        assert!(!incidents[1].is_damaging());
    }

    #[test]
    fn duplicate_id_rejected() {
        let f = write_temp("a,85,27,0,0,0,0,0,2019\na,86,28,0,0,0,0,0,2020\n");
        let err = IncidentReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::DuplicateIncidentId {
                first_row: 0,
                second_row: 1,
                ..
            }
        ));
    }

    #[test]
    fn non_finite_coordinate_rejected() {
        let f = write_temp("a,NaN,27,0,0,0,0,0,2019\n");
        let err = IncidentReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidValue { .. }));
    }

    #[test]
    fn header_only_is_empty() {
        let f = write_temp("");
        let err = IncidentReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn negative_deaths_is_a_parse_error() {
        let f = write_temp("a,85,27,-1,0,0,0,0,2019\n");
        let err = IncidentReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::CsvParse { .. }));
    }
}
