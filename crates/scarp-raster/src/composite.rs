//! Susceptibility Compositor: weighted linear combination of factor layers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::RasterError;
use crate::factor::{FactorKind, FactorLayer};
use crate::grid::{GridSpec, Raster};
use crate::reduce::{Bounds, Reducer};

/// Tolerance on the sum of the weights.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Composite weight table keyed by factor.
///
/// # Defaults
///
/// | Factor       | Weight |
/// |--------------|--------|
/// | `slope`      | 0.30   |
/// | `drainDen`   | 0.10   |
/// | `elev`       | 0.10   |
/// | `clay`       | 0.20   |
/// | `landcover`  | 0.10   |
/// | `soiltex`    | 0.20   |
/// | `drainDist`  | 0.00   |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    weights: Vec<(FactorKind, f64)>,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            weights: vec![
                (FactorKind::Slope, 0.3),
                (FactorKind::DrainageDensity, 0.1),
                (FactorKind::Elevation, 0.1),
                (FactorKind::Clay, 0.2),
                (FactorKind::LandCover, 0.1),
                (FactorKind::SoilTexture, 0.2),
            ],
        }
    }
}

impl CompositeWeights {
    /// Validate a weight table.
    ///
    /// # Errors
    ///
    /// - [`RasterError::InvalidWeight`] for a weight outside [0, 1]
    /// - [`RasterError::DuplicateWeight`] when a factor appears twice
    /// - [`RasterError::WeightsDoNotSumToOne`] when the sum is off by more than 1e-9
    pub fn new(weights: Vec<(FactorKind, f64)>) -> Result<Self, RasterError> {
        for (i, &(kind, weight)) in weights.iter().enumerate() {
            if !(0.0..=1.0).contains(&weight) {
                return Err(RasterError::InvalidWeight { kind, weight });
            }
            if weights[..i].iter().any(|&(k, _)| k == kind) {
                return Err(RasterError::DuplicateWeight { kind });
            }
        }
        let sum: f64 = weights.iter().map(|&(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RasterError::WeightsDoNotSumToOne { sum });
        }
        Ok(Self { weights })
    }

    /// Weight of `kind`; 0 when absent.
    #[must_use]
    pub fn weight(&self, kind: FactorKind) -> f64 {
        self.weights
            .iter()
            .find(|&&(k, _)| k == kind)
            .map_or(0.0, |&(_, w)| w)
    }

    /// Factors with a strictly positive weight.
    pub fn active(&self) -> impl Iterator<Item = (FactorKind, f64)> + '_ {
        self.weights.iter().copied().filter(|&(_, w)| w > 0.0)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[(FactorKind, f64)] {
        &self.weights
    }

    /// Combine `layers` into a susceptibility raster.
    ///
    /// A pixel lacking any weighted factor is no-data. Zero-weight factors
    /// need not be supplied.
    ///
    /// # Errors
    ///
    /// - [`RasterError::MissingFactor`] when a weighted factor has no layer
    /// - [`RasterError::GridMismatch`] when weighted layers do not share a grid
    #[instrument(skip_all, fields(n_layers = layers.len()))]
    pub fn compose(
        &self,
        layers: &[FactorLayer],
        reducer: &Reducer,
    ) -> Result<SusceptibilityRaster, RasterError> {
        let mut weighted: Vec<(&Raster, f64)> = Vec::new();
        for (kind, weight) in self.active() {
            let layer = layers
                .iter()
                .find(|l| l.kind() == kind)
                .ok_or(RasterError::MissingFactor { kind })?;
            if layer.is_degenerate() {
                debug!(factor = %kind, "degenerate factor contributes 0");
            }
            weighted.push((layer.raster(), weight));
        }
        let grid: GridSpec = match weighted.first() {
            Some((r, _)) => *r.spec(),
            None => return Err(RasterError::WeightsDoNotSumToOne { sum: 0.0 }),
        };
        for (r, _) in &weighted[1..] {
            grid.ensure_same(r.spec())?;
        }

        let raw = Raster::from_fn(grid, |row, col| {
            let i = grid.index(row, col);
            weighted
                .iter()
                .try_fold(0.0, |acc, (r, w)| r.get_index(i).map(|v| acc + w * v))
                .unwrap_or(f64::NAN)
        });
        info!(valid = raw.valid_count(), "composite computed");
        Ok(SusceptibilityRaster::from_raw(raw, reducer, false))
    }
}

/// Continuous susceptibility score in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SusceptibilityRaster {
    raw: Raster,
    normalized: Raster,
    bounds: Option<Bounds>,
    population_masked: bool,
}

impl SusceptibilityRaster {
    /// Renormalize a raw composite by its own min/max.
    #[must_use]
    pub fn from_raw(raw: Raster, reducer: &Reducer, population_masked: bool) -> Self {
        let bounds = reducer.bounds(&raw);
        let normalized = match bounds {
            Some(b) => {
                if b.is_degenerate() {
                    warn!(value = b.min, "susceptibility has zero variance, using constant 0");
                }
                raw.map(|v| b.scale(v))
            }
            None => {
                warn!("susceptibility has no valid pixels");
                raw.clone()
            }
        };
        Self {
            raw,
            normalized,
            bounds,
            population_masked,
        }
    }

    /// The composite before renormalization.
    #[must_use]
    pub fn raw(&self) -> &Raster {
        &self.raw
    }

    /// Renormalized score in [0, 1].
    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.normalized
    }

    /// Bounds of the raw composite used for renormalization.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    #[must_use]
    pub fn is_population_masked(&self) -> bool {
        self.population_masked
    }

    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        self.normalized.spec()
    }
}
