use scarp_raster::RasterError;
use scarp_rf::RfError;

/// Errors from assembling, training and applying the landslide classifier.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when a train/validation partition ends up with no records.
    #[error("{partition} partition is empty ({total} usable records)")]
    EmptyPartition {
        /// `"training"` or `"validation"`.
        partition: &'static str,
        /// Records available before the split.
        total: usize,
    },

    /// Returned when a partition holds only one class.
    #[error("{partition} partition has no {class} records")]
    SingleClass {
        /// `"training"` or `"validation"`.
        partition: &'static str,
        /// The missing class.
        class: &'static str,
    },

    /// Returned when a numeric parameter is out of range.
    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when the stack does not match the forest's feature bands.
    #[error("feature stack bands {stack:?} do not match model features {model:?}")]
    BandMismatch {
        /// Band names of the stack.
        stack: Vec<String>,
        /// Feature names the forest was trained on.
        model: Vec<String>,
    },

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Forest(#[from] RfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_pass_through_unchanged() {
        let rf = RfError::EmptyDataset;
        let message = rf.to_string();
        let err: ModelError = rf.into();
        assert!(matches!(err, ModelError::Forest(RfError::EmptyDataset)));
        assert_eq!(err.to_string(), message);
    }
}
