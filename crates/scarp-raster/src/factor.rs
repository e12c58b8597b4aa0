//! Factor Layer Builder: normalized environmental layers on a common grid.
//!
//! Each factor is derived at its source resolution, min-max normalized with
//! bounds computed once over its own domain, and then resampled
//! (nearest-neighbour) onto the common target grid.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::RasterError;
use crate::grid::{GridSpec, METRES_PER_DEGREE, Raster};
use crate::hydrology;
use crate::lookup::LookupTable;
use crate::reduce::{Bounds, Reducer};
use crate::resample::Resampling;
use crate::terrain;

/// Environmental factors contributing to susceptibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactorKind {
    #[serde(rename = "slope")]
    Slope,
    #[serde(rename = "drainDen")]
    DrainageDensity,
    #[serde(rename = "elev")]
    Elevation,
    #[serde(rename = "clay")]
    Clay,
    #[serde(rename = "landcover")]
    LandCover,
    #[serde(rename = "soiltex")]
    SoilTexture,
    #[serde(rename = "drainDist")]
    DistanceToDrainage,
}

impl FactorKind {
    /// Every factor the builder can produce.
    pub const ALL: [FactorKind; 7] = [
        FactorKind::Slope,
        FactorKind::DrainageDensity,
        FactorKind::Elevation,
        FactorKind::Clay,
        FactorKind::LandCover,
        FactorKind::SoilTexture,
        FactorKind::DistanceToDrainage,
    ];

    /// Feature bands used by the classifier, in band order.
    pub const CLASSIFIER_BANDS: [FactorKind; 6] = [
        FactorKind::Slope,
        FactorKind::DrainageDensity,
        FactorKind::Elevation,
        FactorKind::Clay,
        FactorKind::LandCover,
        FactorKind::SoilTexture,
    ];

    /// Short band name used in reports and feature stacks.
    #[must_use]
    pub fn band_name(self) -> &'static str {
        match self {
            FactorKind::Slope => "slope",
            FactorKind::DrainageDensity => "drainDen",
            FactorKind::Elevation => "elev",
            FactorKind::Clay => "clay",
            FactorKind::LandCover => "landcover",
            FactorKind::SoilTexture => "soiltex",
            FactorKind::DistanceToDrainage => "drainDist",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.band_name())
    }
}

impl FromStr for FactorKind {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactorKind::ALL
            .into_iter()
            .find(|k| k.band_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RasterError::UnknownFactor {
                name: s.to_string(),
            })
    }
}

/// A normalized factor raster with the bounds it was normalized by.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorLayer {
    kind: FactorKind,
    raster: Raster,
    bounds: Option<Bounds>,
}

impl FactorLayer {
    /// Min-max normalize `source` into a layer.
    ///
    /// A degenerate domain (`min == max`) yields 0 on every valid pixel; a
    /// source without valid pixels yields an all no-data layer with `None`
    /// bounds. Both cases are logged and neither is an error.
    #[must_use]
    pub fn normalize(kind: FactorKind, source: &Raster, reducer: &Reducer) -> Self {
        let bounds = reducer.bounds(source);
        let raster = match bounds {
            None => {
                warn!(factor = %kind, "factor has no valid pixels");
                source.clone()
            }
            Some(b) => {
                if b.is_degenerate() {
                    warn!(factor = %kind, value = b.min, "factor has zero variance, using constant 0");
                }
                source.map(|v| b.scale(v))
            }
        };
        Self {
            kind,
            raster,
            bounds,
        }
    }

    /// Wrap a raster that is already normalized.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::NotNormalized`] if any valid value lies outside [0, 1].
    pub fn from_normalized(kind: FactorKind, raster: Raster) -> Result<Self, RasterError> {
        if let Some(value) = raster.valid_values().find(|v| !(0.0..=1.0).contains(v)) {
            return Err(RasterError::NotNormalized { kind, value });
        }
        Ok(Self {
            kind,
            raster,
            bounds: Some(Bounds { min: 0.0, max: 1.0 }),
        })
    }

    /// Flip the layer so that low source values score high (`1 - v`).
    #[must_use]
    pub fn inverted(self) -> Self {
        Self {
            raster: self.raster.map(|v| 1.0 - v),
            ..self
        }
    }

    /// Nearest-neighbour resample onto `target`, keeping the source bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::CrsMismatch`] when `target` uses another CRS.
    pub fn resample(&self, target: &GridSpec) -> Result<Self, RasterError> {
        Ok(Self {
            kind: self.kind,
            raster: self.raster.resample(target, Resampling::Nearest)?,
            bounds: self.bounds,
        })
    }

    #[must_use]
    pub fn kind(&self) -> FactorKind {
        self.kind
    }

    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Source-domain bounds used for normalization.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.bounds.is_some_and(|b| b.is_degenerate())
    }
}

/// Settings for the Factor Layer Builder.
///
/// # Defaults
///
/// | Parameter             | Default          |
/// |-----------------------|------------------|
/// | `target_resolution_m` | `Some(1000.0)`   |
/// | `stream_threshold`    | 50.0             |
/// | `drainage_radius_m`   | 5000.0           |
/// | `reducer`             | exact            |
///
/// With `target_resolution_m = None` the elevation grid is the common grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorConfig {
    target_resolution_m: Option<f64>,
    stream_threshold: f64,
    drainage_radius_m: f64,
    reducer: Reducer,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            target_resolution_m: Some(1000.0),
            stream_threshold: 50.0,
            drainage_radius_m: 5000.0,
            reducer: Reducer::new(),
        }
    }
}

impl FactorConfig {
    /// Default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the common grid resolution in metres.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidParameter`] for a non-positive resolution.
    pub fn with_target_resolution_m(mut self, metres: Option<f64>) -> Result<Self, RasterError> {
        if let Some(m) = metres
            && !(m.is_finite() && m > 0.0)
        {
            return Err(RasterError::InvalidParameter {
                parameter: "target_resolution_m",
                value: m,
            });
        }
        self.target_resolution_m = metres;
        Ok(self)
    }

    /// Set the flow-accumulation threshold for stream cells.
    #[must_use]
    pub fn with_stream_threshold(mut self, threshold: f64) -> Self {
        self.stream_threshold = threshold;
        self
    }

    /// Set the drainage-density kernel radius in metres.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidParameter`] for a negative radius.
    pub fn with_drainage_radius_m(mut self, radius: f64) -> Result<Self, RasterError> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(RasterError::InvalidParameter {
                parameter: "drainage_radius_m",
                value: radius,
            });
        }
        self.drainage_radius_m = radius;
        Ok(self)
    }

    #[must_use]
    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    #[must_use]
    pub fn target_resolution_m(&self) -> Option<f64> {
        self.target_resolution_m
    }

    #[must_use]
    pub fn stream_threshold(&self) -> f64 {
        self.stream_threshold
    }

    #[must_use]
    pub fn drainage_radius_m(&self) -> f64 {
        self.drainage_radius_m
    }

    #[must_use]
    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    /// The common grid: `reference`'s extent at the configured resolution.
    ///
    /// # Errors
    ///
    /// Propagates [`RasterError::InvalidGrid`] from grid construction.
    pub fn target_grid(&self, reference: &GridSpec) -> Result<GridSpec, RasterError> {
        match self.target_resolution_m {
            None => Ok(*reference),
            Some(m) => {
                let size = if reference.crs().is_geographic() {
                    m / METRES_PER_DEGREE
                } else {
                    m
                };
                reference.with_cell_size(size)
            }
        }
    }
}

/// Source rasters for every factor.
#[derive(Debug, Clone, Copy)]
pub struct FactorSources<'a> {
    pub elevation: &'a Raster,
    pub land_cover: &'a Raster,
    pub flow_accumulation: &'a Raster,
    pub soil_texture: &'a Raster,
    /// Clay fraction, one raster per depth band.
    pub clay: &'a [Raster],
}

/// Normalized factor layers sharing one grid.
#[derive(Debug, Clone)]
pub struct FactorSet {
    grid: GridSpec,
    layers: Vec<FactorLayer>,
}

impl FactorSet {
    /// Group layers that already share a grid.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if any layer's grid differs from
    /// the first, or [`RasterError::EmptyRaster`] for an empty list.
    pub fn from_layers(layers: Vec<FactorLayer>) -> Result<Self, RasterError> {
        let grid = *layers.first().ok_or(RasterError::EmptyRaster)?.raster().spec();
        for layer in &layers[1..] {
            grid.ensure_same(layer.raster().spec())?;
        }
        Ok(Self { grid, layers })
    }

    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    #[must_use]
    pub fn layers(&self) -> &[FactorLayer] {
        &self.layers
    }

    #[must_use]
    pub fn get(&self, kind: FactorKind) -> Option<&FactorLayer> {
        self.layers.iter().find(|l| l.kind() == kind)
    }
}

/// Build every factor in [`FactorKind::ALL`] on the common grid.
///
/// Factors are computed in parallel. After resampling, each layer's value
/// range is logged so out-of-range factors are visible in the run log.
///
/// # Errors
///
/// Returns [`RasterError::NoBands`] without clay bands, or
/// [`RasterError::GridMismatch`] / [`RasterError::CrsMismatch`] when source
/// rasters cannot be aligned.
#[instrument(skip_all, fields(elevation = %sources.elevation.spec()))]
pub fn build_factors(
    sources: &FactorSources<'_>,
    config: &FactorConfig,
) -> Result<FactorSet, RasterError> {
    let target = config.target_grid(sources.elevation.spec())?;
    info!(grid = %target, "building factor layers");

    let layers = FactorKind::ALL
        .par_iter()
        .map(|&kind| build_factor(kind, sources, config)?.resample(&target))
        .collect::<Result<Vec<_>, _>>()?;

    for layer in &layers {
        match Reducer::new().bounds(layer.raster()) {
            Some(b) => info!(factor = %layer.kind(), min = b.min, max = b.max, "factor range"),
            None => warn!(factor = %layer.kind(), "factor is empty on the common grid"),
        }
    }
    FactorSet::from_layers(layers)
}

/// Derive and normalize one factor at its source resolution.
///
/// # Errors
///
/// Returns [`RasterError::NoBands`] for [`FactorKind::Clay`] without bands,
/// or [`RasterError::GridMismatch`] if the clay bands disagree.
pub fn build_factor(
    kind: FactorKind,
    sources: &FactorSources<'_>,
    config: &FactorConfig,
) -> Result<FactorLayer, RasterError> {
    let reducer = config.reducer();
    let layer = match kind {
        FactorKind::Slope => {
            FactorLayer::normalize(kind, &terrain::slope_degrees(sources.elevation), reducer)
        }
        FactorKind::Elevation => FactorLayer::normalize(kind, sources.elevation, reducer),
        FactorKind::LandCover => FactorLayer::normalize(
            kind,
            &LookupTable::land_cover().apply(sources.land_cover),
            reducer,
        ),
        FactorKind::SoilTexture => FactorLayer::normalize(
            kind,
            &LookupTable::soil_texture().apply(sources.soil_texture),
            reducer,
        ),
        FactorKind::DrainageDensity => FactorLayer::normalize(
            kind,
            &hydrology::drainage_density(
                sources.flow_accumulation,
                config.stream_threshold(),
                config.drainage_radius_m(),
            ),
            reducer,
        ),
        FactorKind::DistanceToDrainage => FactorLayer::normalize(
            kind,
            &hydrology::distance_to_drainage(sources.flow_accumulation, config.stream_threshold()),
            reducer,
        )
        .inverted(),
        FactorKind::Clay => FactorLayer::normalize(kind, &band_mean(kind, sources.clay)?, reducer),
    };
    Ok(layer)
}

/// Per-pixel mean of the valid values across `bands`.
///
/// # Errors
///
/// Returns [`RasterError::NoBands`] for an empty slice or
/// [`RasterError::GridMismatch`] if the bands do not share a grid.
pub fn band_mean(kind: FactorKind, bands: &[Raster]) -> Result<Raster, RasterError> {
    let first = bands.first().ok_or(RasterError::NoBands { kind })?;
    let spec = *first.spec();
    for band in &bands[1..] {
        spec.ensure_same(band.spec())?;
    }
    let data = (0..spec.len())
        .into_par_iter()
        .map(|i| {
            let (sum, n) = bands
                .iter()
                .filter_map(|b| b.get_index(i))
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 { f64::NAN } else { sum / n as f64 }
        })
        .collect();
    Ok(Raster::from_parts(spec, data))
}
