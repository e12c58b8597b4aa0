//! Errors raised while reading inputs and writing artifacts.

use std::path::PathBuf;

use scarp_raster::RasterError;

/// Errors from reading inputs and writing results.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot read {path}")]
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("malformed CSV in {path} near byte {offset}")]
    CsvParse {
        path: PathBuf,
        offset: u64,
        source: csv::Error,
    },

    /// Returned when a file holds a header but no data.
    #[error("{path} has a header but no records")]
    EmptyDataset { path: PathBuf },

    /// Returned when a raster header line is missing or malformed.
    #[error("invalid raster header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    /// Returned when a value cannot be parsed or is not finite.
    #[error("invalid value in {path}: record {record}, raw value \"{raw}\"")]
    InvalidValue {
        path: PathBuf,
        record: usize,
        raw: String,
    },

    /// Returned when the same incident ID appears more than once.
    #[error("duplicate incident ID \"{id}\" in {path}: first at row {first_row}, again at row {second_row}")]
    DuplicateIncidentId {
        path: PathBuf,
        id: String,
        first_row: usize,
        second_row: usize,
    },

    /// Returned when a JSON file cannot be parsed.
    #[error("{path} is not valid JSON")]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Returned when GeoJSON is well-formed JSON but not a usable polygon source.
    #[error("invalid GeoJSON in {path}: {reason}")]
    InvalidGeoJson { path: PathBuf, reason: String },

    /// Returned when an experiment name is not a safe file prefix.
    #[error("invalid experiment name {name:?}: {reason}")]
    InvalidExperimentName { name: String, reason: &'static str },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a result cannot be encoded as JSON.
    #[error("cannot encode the {artifact} artifact as JSON")]
    Serialize {
        artifact: String,
        source: serde_json::Error,
    },

    /// Returned when a parsed raster violates grid invariants.
    #[error("invalid raster in {path}")]
    Raster {
        path: PathBuf,
        source: RasterError,
    },
}
