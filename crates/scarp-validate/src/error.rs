use scarp_raster::RasterError;

/// Errors from point generation, sampling and validation statistics.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Returned when the study-area polygon cannot be sampled from.
    #[error("invalid study area: {reason}")]
    InvalidStudyArea {
        /// What is wrong with the polygon.
        reason: String,
    },

    /// Returned when a statistic would be computed over no points.
    #[error("no sampled points for {context}")]
    EmptySample {
        /// Which tabulation came up empty.
        context: &'static str,
    },

    /// Returned when the population mask has no populated cells, so the
    /// oversample factor is undefined.
    #[error("population mask covers no area (domain {domain_km2} km²)")]
    NoPopulatedArea {
        /// Area of the sampling domain.
        domain_km2: f64,
    },

    /// Returned when a numeric parameter is out of range.
    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Raster-level failure, typically a grid mismatch between inputs.
    #[error(transparent)]
    Raster(#[from] RasterError),
}
