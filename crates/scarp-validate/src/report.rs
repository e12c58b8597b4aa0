//! Validation Engine: observed vs. synthetic comparison per scope.

use scarp_raster::{Raster, Zone, ZoneRaster};
use serde::Serialize;
use tracing::{info, instrument};

use crate::confusion::{BinaryConfusion, BinaryMetrics};
use crate::error::ValidationError;
use crate::histogram::{CRITICAL_VALUES, ChiSquare, Significance, ZoneHistogram};
use crate::point::PointSet;
use crate::sample::{SampledSet, Sampler};

/// Which zonation a report was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Whole-domain zones, all points.
    Global,
    /// Population-masked zones, populated-filtered points.
    Populated,
}

/// Everything one validation pass reads.
#[derive(Debug, Clone, Copy)]
pub struct ScopeInputs<'a> {
    pub susceptibility: &'a Raster,
    pub zones: &'a ZoneRaster,
    pub observed: &'a PointSet,
    pub synthetic: &'a PointSet,
}

/// Critical value reported next to the statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalValue {
    pub level: Significance,
    pub value: f64,
}

/// Histograms, chi-square and confusion metrics for one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub scope: Scope,
    pub observed_points: usize,
    pub synthetic_points: usize,
    pub observed: ZoneHistogram,
    pub synthetic: ZoneHistogram,
    pub observed_percentages: [(Zone, f64); 3],
    pub synthetic_percentages: [(Zone, f64); 3],
    pub chi_square: ChiSquare,
    pub significance: Significance,
    pub critical_values: Vec<CriticalValue>,
    pub confusion: BinaryConfusion,
    pub metrics: BinaryMetrics,
    #[serde(skip)]
    pub samples: Vec<SampledSet>,
}

/// Global and populated reports, side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub global: ValidationReport,
    pub populated: ValidationReport,
}

/// Run one validation pass.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ValidationError::Raster`] | susceptibility and zones are on different grids |
/// | [`ValidationError::EmptySample`] | no observed or no synthetic point has a zone |
#[instrument(skip_all, fields(scope = ?scope))]
pub fn validate_scope(scope: Scope, inputs: ScopeInputs<'_>) -> Result<ValidationReport, ValidationError> {
    let sampler = Sampler::new(inputs.susceptibility, inputs.zones)?;
    let observed = SampledSet::new(inputs.observed.origin(), sampler.sample(inputs.observed));
    let synthetic = SampledSet::new(inputs.synthetic.origin(), sampler.sample(inputs.synthetic));

    let observed_hist = ZoneHistogram::from_samples(&observed.samples);
    let synthetic_hist = ZoneHistogram::from_samples(&synthetic.samples);
    if observed_hist.total() == 0 {
        return Err(ValidationError::EmptySample {
            context: "observed zone histogram",
        });
    }
    if synthetic_hist.total() == 0 {
        return Err(ValidationError::EmptySample {
            context: "synthetic zone histogram",
        });
    }

    let chi_square = ChiSquare::compute(&observed_hist, &synthetic_hist);
    let confusion = BinaryConfusion::from_zone_samples(&observed.samples, &synthetic.samples)?;
    let metrics = confusion.metrics();
    info!(
        chi_square = chi_square.statistic,
        significance = ?chi_square.significance(),
        precision = ?metrics.precision,
        recall = ?metrics.recall,
        f1 = metrics.f1,
        "validation pass complete"
    );

    Ok(ValidationReport {
        scope,
        observed_points: inputs.observed.len(),
        synthetic_points: inputs.synthetic.len(),
        observed: observed_hist,
        synthetic: synthetic_hist,
        observed_percentages: observed_hist.proportions(),
        synthetic_percentages: synthetic_hist.proportions(),
        chi_square,
        significance: chi_square.significance(),
        critical_values: CRITICAL_VALUES
            .iter()
            .map(|&(level, value)| CriticalValue { level, value })
            .collect(),
        confusion,
        metrics,
        samples: vec![observed, synthetic],
    })
}

/// Run the global and populated passes in parallel.
///
/// # Errors
///
/// Returns the first error of either pass, global first.
pub fn validate_both(
    global: ScopeInputs<'_>,
    populated: ScopeInputs<'_>,
) -> Result<ComparisonReport, ValidationError> {
    let (global, populated) = rayon::join(
        || validate_scope(Scope::Global, global),
        || validate_scope(Scope::Populated, populated),
    );
    Ok(ComparisonReport {
        global: global?,
        populated: populated?,
    })
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use scarp_raster::{Crs, GridSpec, Tertiles};

    use super::*;

    /// 1×3 strip: Low, Medium, High from west to east.
    fn strip() -> (Raster, ZoneRaster) {
        let spec = GridSpec::new(1, 3, 0.0, 1.0, 1.0, Crs::Projected { epsg: 32645 }).unwrap();
        let raster = Raster::new(spec, vec![0.1, 0.5, 0.9]).unwrap();
        let zones = ZoneRaster::with_tertiles(&raster, Tertiles { p33: 0.3, p66: 0.7 });
        (raster, zones)
    }

    fn at(xs: &[f64]) -> PointSet {
        PointSet::synthetic(xs.iter().map(|&x| Point::new(x, 0.5)).collect())
    }

    #[test]
    fn incidents_clustered_in_high_zone() {
        let (raster, zones) = strip();
        let observed = at(&[2.5, 2.5, 2.5, 2.5, 1.5]);
        let synthetic = at(&[0.5, 1.5, 2.5, 0.5, 1.5]);
        let report = validate_scope(
            Scope::Global,
            ScopeInputs {
                susceptibility: &raster,
                zones: &zones,
                observed: &observed,
                synthetic: &synthetic,
            },
        )
        .unwrap();
        assert_eq!(report.observed.get(Zone::High), 4);
        assert_eq!(report.synthetic.get(Zone::Low), 2);
        // (0-2)²/2 + (1-2)²/2 + (4-1)²/1
        assert!((report.chi_square.statistic - 11.5).abs() < 1e-12);
        assert_eq!(report.significance, Significance::P99);
        assert_eq!(report.confusion.true_positive, 4);
        assert_eq!(report.confusion.false_positive, 1);
        assert_eq!(report.confusion.total(), 10);
    }

    #[test]
    fn observed_off_grid_is_empty_sample() {
        let (raster, zones) = strip();
        let observed = at(&[-5.0]);
        let synthetic = at(&[0.5]);
        let err = validate_scope(
            Scope::Global,
            ScopeInputs {
                susceptibility: &raster,
                zones: &zones,
                observed: &observed,
                synthetic: &synthetic,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::EmptySample { .. }));
    }

    #[test]
    fn both_scopes_reported_separately() {
        let (raster, zones) = strip();
        let observed = at(&[2.5, 1.5]);
        let synthetic = at(&[0.5, 0.5]);
        let populated_obs = at(&[2.5]);
        let global = ScopeInputs {
            susceptibility: &raster,
            zones: &zones,
            observed: &observed,
            synthetic: &synthetic,
        };
        let populated = ScopeInputs {
            observed: &populated_obs,
            ..global
        };
        let report = validate_both(global, populated).unwrap();
        assert_eq!(report.global.scope, Scope::Global);
        assert_eq!(report.populated.scope, Scope::Populated);
        assert_eq!(report.global.observed.total(), 2);
        assert_eq!(report.populated.observed.total(), 1);
    }
}
