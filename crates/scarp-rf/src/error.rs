use std::path::PathBuf;

/// Errors from forest configuration, training, prediction and model files.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when a configuration value is out of range.
    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when max_features resolves to 0 or exceeds the band count.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        max_features: usize,
        n_features: usize,
    },

    /// Returned when the training set has no records.
    #[error("training set has no records")]
    EmptyDataset,

    /// Returned when the records carry no feature bands.
    #[error("training records have no feature bands")]
    ZeroFeatures,

    #[error("{n_samples} feature rows but {n_labels} labels")]
    LabelCountMismatch { n_samples: usize, n_labels: usize },

    /// Returned when the band name list does not match the column count.
    #[error("{n_names} band names for {n_features} feature columns")]
    FeatureNameMismatch { n_names: usize, n_features: usize },

    /// Returned when a record's width differs from the first record.
    #[error("record {sample_index} has {got} bands, expected {expected}")]
    FeatureCountMismatch {
        expected: usize,
        got: usize,
        sample_index: usize,
    },

    /// Returned when a pixel handed to the forest has the wrong width.
    #[error("prediction input has {got} bands, expected {expected}")]
    PredictionFeatureMismatch { expected: usize, got: usize },

    /// Returned when a training value is NaN or infinite.
    ///
    /// Records with missing bands must be dropped before training.
    #[error("non-finite value at record {sample_index}, band {feature_index}")]
    NonFiniteValue {
        sample_index: usize,
        feature_index: usize,
    },

    /// Returned when every record landed in every bootstrap.
    #[error("no record was left out of any bootstrap; out-of-bag score undefined")]
    NoOutOfBagSamples,

    /// Returned when the model file cannot be read or written.
    #[error("cannot {action} model file {path}")]
    ModelFile {
        /// `"read"` or `"write"`.
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when bincode cannot encode or decode the model.
    #[error("model encoding failed for {path}")]
    ModelEncoding {
        path: PathBuf,
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when a model file was written by an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        expected: u32,
        found: u32,
        path: PathBuf,
    },
}
