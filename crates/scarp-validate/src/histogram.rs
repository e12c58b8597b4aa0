//! Zone frequency histograms and the chi-square comparison.

use scarp_raster::{Zone, ZoneCounts};
use serde::{Deserialize, Serialize};

use crate::sample::Sample;

/// Critical values of χ² with 2 degrees of freedom.
pub const CRITICAL_VALUES: [(Significance, f64); 3] = [
    (Significance::P95, 5.991),
    (Significance::P99, 9.210),
    (Significance::P999, 13.82),
];

/// Zone frequencies of a sample; points without a zone are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneHistogram {
    pub counts: ZoneCounts,
    /// Points that fell off the grid or on no-data pixels.
    pub excluded: usize,
}

impl ZoneHistogram {
    #[must_use]
    pub fn from_samples(samples: &[Sample]) -> Self {
        let counts: ZoneCounts = samples.iter().filter_map(|s| s.zone).collect();
        Self {
            counts,
            excluded: samples.len() - counts.total(),
        }
    }

    #[must_use]
    pub fn get(&self, zone: Zone) -> usize {
        self.counts.get(zone)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.total()
    }

    /// Percentage of zoned points in `zone`.
    #[must_use]
    pub fn percentage(&self, zone: Zone) -> f64 {
        100.0 * self.counts.fraction(zone)
    }

    /// `(zone, percentage)` for Low, Medium, High.
    #[must_use]
    pub fn proportions(&self) -> [(Zone, f64); 3] {
        Zone::ALL.map(|z| (z, self.percentage(z)))
    }
}

/// Highest confidence level a χ² statistic clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    NotSignificant,
    P95,
    P99,
    P999,
}

impl Significance {
    /// Confidence level in percent, `None` below 95%.
    #[must_use]
    pub fn confidence(self) -> Option<f64> {
        match self {
            Significance::NotSignificant => None,
            Significance::P95 => Some(95.0),
            Significance::P99 => Some(99.0),
            Significance::P999 => Some(99.9),
        }
    }
}

/// Pearson χ² of observed against expected zone frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChiSquare {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
}

impl ChiSquare {
    /// `Σ (O − E)² / max(E, 1)` over every zone present in either histogram.
    ///
    /// Summing only over zones the observed set reaches would score a
    /// zone chance fills but incidents never do as a perfect fit. The union
    /// keeps the statistic at 0 only when both histograms are equal; zones
    /// empty on both sides contribute nothing either way.
    #[must_use]
    pub fn compute(observed: &ZoneHistogram, expected: &ZoneHistogram) -> Self {
        let statistic = Zone::ALL
            .iter()
            .filter(|&&z| observed.get(z) > 0 || expected.get(z) > 0)
            .map(|&z| {
                let o = observed.get(z) as f64;
                let e = expected.get(z) as f64;
                (o - e).powi(2) / e.max(1.0)
            })
            .sum();
        Self {
            statistic,
            degrees_of_freedom: Zone::ALL.len() - 1,
        }
    }

    #[must_use]
    pub fn significance(&self) -> Significance {
        CRITICAL_VALUES
            .iter()
            .rev()
            .find(|(_, critical)| self.statistic > *critical)
            .map_or(Significance::NotSignificant, |(level, _)| *level)
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;

    fn histogram(low: usize, medium: usize, high: usize) -> ZoneHistogram {
        ZoneHistogram {
            counts: ZoneCounts { low, medium, high },
            excluded: 0,
        }
    }

    #[test]
    fn chi_square_matches_hand_computation() {
        let chi = ChiSquare::compute(&histogram(100, 150, 250), &histogram(150, 150, 200));
        assert!((chi.statistic - 29.1667).abs() < 1e-3, "{}", chi.statistic);
        assert_eq!(chi.degrees_of_freedom, 2);
        assert_eq!(chi.significance(), Significance::P999);
    }

    #[test]
    fn identical_histograms_score_zero() {
        let h = histogram(12, 40, 7);
        let chi = ChiSquare::compute(&h, &h);
        assert_eq!(chi.statistic, 0.0);
        assert_eq!(chi.significance(), Significance::NotSignificant);
    }

    #[test]
    fn empty_expected_bin_floors_denominator() {
        let chi = ChiSquare::compute(&histogram(0, 0, 4), &histogram(3, 1, 0));
        assert!((chi.statistic - (9.0 + 1.0 + 16.0)).abs() < 1e-12);
    }

    #[test]
    fn zone_missing_from_observed_still_counts() {
        let chi = ChiSquare::compute(&histogram(10, 10, 0), &histogram(10, 10, 10));
        assert!((chi.statistic - 10.0).abs() < 1e-12);
        assert!(chi.statistic > 0.0);
    }

    #[test]
    fn significance_levels() {
        let at = |statistic| ChiSquare {
            statistic,
            degrees_of_freedom: 2,
        };
        assert_eq!(at(5.0).significance(), Significance::NotSignificant);
        assert_eq!(at(6.0).significance(), Significance::P95);
        assert_eq!(at(9.5).significance(), Significance::P99);
        assert_eq!(at(13.9).significance(), Significance::P999);
        assert_eq!(Significance::P99.confidence(), Some(99.0));
    }

    #[test]
    fn histogram_excludes_unzoned_points() {
        let s = |zone| Sample {
            location: Point::new(0.0, 0.0),
            value: None,
            zone,
        };
        let h = ZoneHistogram::from_samples(&[
            s(Some(Zone::High)),
            s(None),
            s(Some(Zone::High)),
            s(Some(Zone::Low)),
        ]);
        assert_eq!(h.total(), 3);
        assert_eq!(h.excluded, 1);
        assert_eq!(h.get(Zone::High), 2);
        let [(_, low), (_, medium), (_, high)] = h.proportions();
        assert!((low - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(medium, 0.0);
        assert!((high - 200.0 / 3.0).abs() < 1e-9);
    }
}
