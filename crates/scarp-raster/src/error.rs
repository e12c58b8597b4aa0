use crate::factor::FactorKind;
use crate::grid::{Crs, GridSpec};

/// Errors from raster construction, resampling, compositing and zonation.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Returned when a grid has zero rows/columns or a non-positive cell size.
    #[error("invalid grid: {rows} rows x {cols} cols, cell size {cell_size}")]
    InvalidGrid {
        /// Requested row count.
        rows: usize,
        /// Requested column count.
        cols: usize,
        /// Requested cell size in CRS units.
        cell_size: f64,
    },

    /// Returned when a data buffer does not match the grid's cell count.
    #[error("raster data has {got} cells, grid expects {expected}")]
    DataLengthMismatch {
        /// Cell count implied by the grid.
        expected: usize,
        /// Length of the supplied buffer.
        got: usize,
    },

    /// Returned when two rasters that must share a grid do not.
    #[error("grid mismatch: expected {expected}, found {found}")]
    GridMismatch {
        /// The grid of the reference raster.
        expected: GridSpec,
        /// The grid of the offending raster.
        found: GridSpec,
    },

    /// Returned when resampling between coordinate reference systems.
    #[error("cannot resample from {from} to {to}: reprojection is not supported")]
    CrsMismatch {
        /// CRS of the input raster.
        from: Crs,
        /// CRS of the target grid.
        to: Crs,
    },

    /// Returned when a CRS string cannot be parsed.
    #[error("invalid CRS \"{raw}\": expected EPSG:<code>")]
    InvalidCrs {
        /// The raw string that failed to parse.
        raw: String,
    },

    /// Returned when a composite weight lies outside [0, 1] or is not finite.
    #[error("weight for {kind} must be in [0, 1], got {weight}")]
    InvalidWeight {
        /// The factor carrying the bad weight.
        kind: FactorKind,
        /// The rejected weight.
        weight: f64,
    },

    /// Returned when the same factor appears twice in a weight table.
    #[error("factor {kind} is weighted more than once")]
    DuplicateWeight {
        /// The repeated factor.
        kind: FactorKind,
    },

    /// Returned when composite weights do not sum to 1.0 within 1e-9.
    #[error("composite weights sum to {sum}, expected 1.0")]
    WeightsDoNotSumToOne {
        /// The actual sum of the weights.
        sum: f64,
    },

    /// Returned when a weighted factor is absent from the layers handed to the compositor.
    #[error("factor {kind} has a non-zero weight but no layer was supplied")]
    MissingFactor {
        /// The missing factor.
        kind: FactorKind,
    },

    /// Returned when a factor or band name is not recognised.
    #[error("unknown factor \"{name}\"")]
    UnknownFactor {
        /// The unrecognised name.
        name: String,
    },

    /// Returned when a layer declared as normalized holds values outside [0, 1].
    #[error("layer {kind} is not normalized: found {value}")]
    NotNormalized {
        /// The offending factor.
        kind: FactorKind,
        /// First value found outside [0, 1].
        value: f64,
    },

    /// Returned when a lookup table maps a code outside [0, 1].
    #[error("lookup value for code {code} must be in [0, 1], got {value}")]
    InvalidLookupValue {
        /// Category code.
        code: i64,
        /// The rejected ordinal.
        value: f64,
    },

    /// Returned when a multi-band factor receives no bands.
    #[error("factor {kind} needs at least one source band")]
    NoBands {
        /// The factor being built.
        kind: FactorKind,
    },

    /// Returned when a reduction that requires data finds no valid pixel.
    #[error("raster has no valid pixels")]
    EmptyRaster,

    /// Returned when a numeric configuration parameter is out of range.
    #[error("invalid value for {parameter}: {value}")]
    InvalidParameter {
        /// Name of the parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },
}
