//! Binary confusion matrix and derived metrics.

use scarp_raster::Zone;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::sample::Sample;

/// Counts of a binary classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
}

impl BinaryConfusion {
    /// Tabulate `(predicted, actual)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (bool, bool)>) -> Self {
        let mut m = Self::default();
        for (predicted, actual) in pairs {
            m.record(predicted, actual);
        }
        m
    }

    /// One tabulation over the merged samples: predicted positive iff the
    /// zone is High, actual positive for `observed`. Unzoned samples are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySample`] when no sample has a zone.
    pub fn from_zone_samples(observed: &[Sample], synthetic: &[Sample]) -> Result<Self, ValidationError> {
        let observed = observed.iter().filter_map(|s| s.zone).map(|z| (z == Zone::High, true));
        let synthetic = synthetic.iter().filter_map(|s| s.zone).map(|z| (z == Zone::High, false));
        let m = Self::from_pairs(observed.chain(synthetic));
        if m.total() == 0 {
            return Err(ValidationError::EmptySample {
                context: "zone confusion matrix",
            });
        }
        Ok(m)
    }

    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positive += 1,
            (true, false) => self.false_positive += 1,
            (false, true) => self.false_negative += 1,
            (false, false) => self.true_negative += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }

    /// TP / (TP + FP), `None` when nothing was predicted positive.
    #[must_use]
    pub fn precision(&self) -> Option<f64> {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// TP / (TP + FN), `None` when there are no actual positives.
    #[must_use]
    pub fn recall(&self) -> Option<f64> {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// `2PR / max(P + R, 1)`; undefined precision or recall counts as 0.
    #[must_use]
    pub fn f1(&self) -> f64 {
        let p = self.precision().unwrap_or(0.0);
        let r = self.recall().unwrap_or(0.0);
        2.0 * p * r / (p + r).max(1.0)
    }

    /// Share of correct predictions, 0 for an empty matrix.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total()).unwrap_or(0.0)
    }

    #[must_use]
    pub fn metrics(&self) -> BinaryMetrics {
        BinaryMetrics {
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
            accuracy: self.accuracy(),
        }
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Metrics derived from a [`BinaryConfusion`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: f64,
    pub accuracy: f64,
}
