//! Labeled training records and the seeded train/validation split.

use geo::Point;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scarp_validate::PointSet;
use tracing::{info, instrument, warn};

use crate::error::ModelError;
use crate::stack::FeatureStack;

/// Feature vector and class of one point.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub location: Point<f64>,
    pub features: Vec<f64>,
    /// `true` for an incident, `false` for a synthetic negative.
    pub label: bool,
}

/// Labeled records in input order: positives first, then negatives.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    records: Vec<LabeledRecord>,
    band_names: Vec<String>,
    dropped: usize,
}

impl TrainingSet {
    /// Extract the stack at every point. Records with any missing band are
    /// dropped and counted, never imputed.
    #[instrument(skip_all, fields(positives = positives.len(), negatives = negatives.len()))]
    pub fn from_points(stack: &FeatureStack, positives: &PointSet, negatives: &PointSet) -> Self {
        let mut records = Vec::with_capacity(positives.len() + negatives.len());
        let mut dropped = 0usize;
        for (set, label) in [(positives, true), (negatives, false)] {
            for location in set.locations() {
                match stack.sample_at(location.x(), location.y()) {
                    Some(features) => records.push(LabeledRecord {
                        location,
                        features,
                        label,
                    }),
                    None => dropped += 1,
                }
            }
        }
        if dropped > 0 {
            warn!(dropped, "records with missing features dropped");
        }
        let set = Self {
            records,
            band_names: stack.band_names(),
            dropped,
        };
        info!(
            records = set.len(),
            positives = set.n_positive(),
            dropped,
            "training set assembled"
        );
        set
    }

    #[must_use]
    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    #[must_use]
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Records dropped for missing features.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn n_positive(&self) -> usize {
        self.records.iter().filter(|r| r.label).count()
    }

    /// Draw one uniform value per record from a seeded RNG; values below
    /// `ratio` go to training, the rest to validation.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::InvalidParameter`] | `ratio` outside (0, 1) |
    /// | [`ModelError::EmptyPartition`] | either partition is empty |
    pub fn split(&self, ratio: f64, seed: u64) -> Result<Split, ModelError> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ModelError::InvalidParameter {
                parameter: "split_ratio",
                value: ratio,
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (train, validation): (Vec<_>, Vec<_>) = self
            .records
            .iter()
            .cloned()
            .partition(|_| rng.r#gen::<f64>() < ratio);
        let total = self.records.len();
        if train.is_empty() {
            return Err(ModelError::EmptyPartition {
                partition: "training",
                total,
            });
        }
        if validation.is_empty() {
            return Err(ModelError::EmptyPartition {
                partition: "validation",
                total,
            });
        }
        info!(train = train.len(), validation = validation.len(), "records split");
        Ok(Split { train, validation })
    }
}

/// Train and validation partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<LabeledRecord>,
    pub validation: Vec<LabeledRecord>,
}

/// Row-major features and labels of `records`.
pub(crate) fn columns(records: &[LabeledRecord]) -> (Vec<Vec<f64>>, Vec<bool>) {
    records.iter().map(|r| (r.features.clone(), r.label)).unzip()
}
