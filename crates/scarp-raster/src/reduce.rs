//! Domain reductions: min/max bounds, percentiles and moments.
//!
//! All reductions skip no-data. A [`Reducer`] can cap the number of pixels it
//! reads with a deterministic stride subsample; the same reducer must be used
//! for every raster that takes part in one comparison.

use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::grid::Raster;

/// Closed value range of a raster, used for min-max normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest valid value.
    pub min: f64,
    /// Largest valid value.
    pub max: f64,
}

impl Bounds {
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// `min == max`: the layer carries no contrast.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.span() <= 0.0
    }

    /// Map `value` into [0, 1]. Degenerate bounds map everything to 0.
    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            ((value - self.min) / self.span()).clamp(0.0, 1.0)
        }
    }
}

/// Reduction settings shared by normalization and zonation.
///
/// # Defaults
///
/// | Parameter    | Default |
/// |--------------|---------|
/// | `max_pixels` | `None`  |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reducer {
    max_pixels: Option<usize>,
}

impl Reducer {
    /// An exact reducer that reads every valid pixel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of pixels read.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidParameter`] for a zero budget.
    pub fn with_max_pixels(mut self, max_pixels: usize) -> Result<Self, RasterError> {
        if max_pixels == 0 {
            return Err(RasterError::InvalidParameter {
                parameter: "max_pixels",
                value: 0.0,
            });
        }
        self.max_pixels = Some(max_pixels);
        Ok(self)
    }

    #[must_use]
    pub fn max_pixels(&self) -> Option<usize> {
        self.max_pixels
    }

    /// Valid values read under the pixel budget.
    ///
    /// When the raster has more valid pixels than the budget, every
    /// `ceil(count / budget)`-th valid pixel is taken in row-major order.
    #[must_use]
    pub fn sample(&self, raster: &Raster) -> Vec<f64> {
        let valid = raster.valid_count();
        match self.max_pixels {
            Some(budget) if valid > budget => {
                let stride = valid.div_ceil(budget);
                raster.valid_values().step_by(stride).collect()
            }
            _ => raster.valid_values().collect(),
        }
    }

    /// Min and max of the valid pixels, `None` when there are none.
    #[must_use]
    pub fn bounds(&self, raster: &Raster) -> Option<Bounds> {
        bounds_of(&self.sample(raster))
    }

    /// Nearest-rank percentiles (`0..=100`) of the valid pixels.
    ///
    /// Returns `None` when the raster has no valid pixel.
    #[must_use]
    pub fn percentiles(&self, raster: &Raster, ps: &[f64]) -> Option<Vec<f64>> {
        let mut values = self.sample(raster);
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        Some(ps.iter().map(|&p| nearest_rank(&values, p)).collect())
    }

    /// Mean and population standard deviation of the valid pixels.
    #[must_use]
    pub fn mean_std(&self, raster: &Raster) -> Option<(f64, f64)> {
        mean_std(&self.sample(raster))
    }
}

/// Min/max of a slice, ignoring NaN.
#[must_use]
pub fn bounds_of(values: &[f64]) -> Option<Bounds> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<Bounds>, v| {
            Some(match acc {
                None => Bounds { min: v, max: v },
                Some(b) => Bounds {
                    min: b.min.min(v),
                    max: b.max.max(v),
                },
            })
        })
}

/// Nearest-rank percentile of an ascending, non-empty slice.
///
/// The rank is `ceil(p / 100 * n)` clamped to `1..=n`.
#[must_use]
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

/// Mean and population standard deviation, `None` for an empty slice.
#[must_use]
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Crs, GridSpec};

    fn raster(values: Vec<f64>) -> Raster {
        let spec = GridSpec::new(1, values.len(), 0.0, 0.0, 1.0, Crs::WGS84).unwrap();
        Raster::new(spec, values).unwrap()
    }

    #[test]
    fn bounds_skip_nodata() {
        let r = raster(vec![f64::NAN, 3.0, -1.0, 7.0]);
        let b = Reducer::new().bounds(&r).unwrap();
        assert_eq!((b.min, b.max), (-1.0, 7.0));
    }

    #[test]
    fn bounds_of_empty_raster_is_none() {
        let r = raster(vec![f64::NAN; 3]);
        assert!(Reducer::new().bounds(&r).is_none());
    }

    #[test]
    fn degenerate_bounds_scale_to_zero() {
        let b = Bounds { min: 2.0, max: 2.0 };
        assert!(b.is_degenerate());
        assert_eq!(b.scale(2.0), 0.0);
    }

    #[test]
    fn budget_takes_a_deterministic_stride() {
        let r = raster((0..10).map(f64::from).collect());
        let reducer = Reducer::new().with_max_pixels(4).unwrap();
        assert_eq!(reducer.sample(&r), vec![0.0, 3.0, 6.0, 9.0]);
        assert_eq!(reducer.sample(&r), reducer.sample(&r));
    }

    #[test]
    fn zero_budget_rejected() {
        assert!(Reducer::new().with_max_pixels(0).is_err());
    }

    #[test]
    fn nearest_rank_percentiles() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(nearest_rank(&sorted, 33.0), 4.0);
        assert_eq!(nearest_rank(&sorted, 66.0), 7.0);
        assert_eq!(nearest_rank(&sorted, 0.0), 1.0);
        assert_eq!(nearest_rank(&sorted, 100.0), 10.0);
    }

    #[test]
    fn mean_std_of_constant_is_zero_spread() {
        let (mean, std) = mean_std(&[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(mean, 2.0);
        assert_eq!(std, 0.0);
        assert!(mean_std(&[]).is_none());
    }
}
