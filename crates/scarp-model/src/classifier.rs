//! Classifier Trainer: train, evaluate and apply the Random Forest.

use rayon::prelude::*;
use scarp_raster::Raster;
use scarp_rf::{OobMode, OobScore, RandomForest, RandomForestConfig, RankedFeature};
use scarp_validate::{BinaryConfusion, BinaryMetrics};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::ModelError;
use crate::stack::FeatureStack;
use crate::training::{LabeledRecord, TrainingSet, columns};

/// Configuration for classifier training.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `n_trees` | 50 |
/// | `split_ratio` | 0.7 |
/// | `seed` | 42 |
/// | `bootstrap_fraction` | 1.0 |
/// | `oob` | enabled |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    n_trees: usize,
    split_ratio: f64,
    seed: u64,
    bootstrap_fraction: f64,
    oob: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            split_ratio: 0.7,
            seed: 42,
            bootstrap_fraction: 1.0,
            oob: true,
        }
    }
}

impl ClassifierConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] when `n_trees` is zero.
    pub fn with_n_trees(mut self, n_trees: usize) -> Result<Self, ModelError> {
        if n_trees == 0 {
            return Err(ModelError::InvalidParameter {
                parameter: "n_trees",
                value: 0.0,
            });
        }
        self.n_trees = n_trees;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] unless `0 < ratio < 1`.
    pub fn with_split_ratio(mut self, ratio: f64) -> Result<Self, ModelError> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ModelError::InvalidParameter {
                parameter: "split_ratio",
                value: ratio,
            });
        }
        self.split_ratio = ratio;
        Ok(self)
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bootstrap sample size as a fraction of the training partition.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] unless `0 < fraction <= 1`.
    pub fn with_bootstrap_fraction(mut self, fraction: f64) -> Result<Self, ModelError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ModelError::InvalidParameter {
                parameter: "bootstrap_fraction",
                value: fraction,
            });
        }
        self.bootstrap_fraction = fraction;
        Ok(self)
    }

    #[must_use]
    pub fn with_oob(mut self, oob: bool) -> Self {
        self.oob = oob;
        self
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn forest_config(&self) -> Result<RandomForestConfig, ModelError> {
        Ok(RandomForestConfig::new(self.n_trees)?
            .with_seed(self.seed)
            .with_bootstrap_fraction(self.bootstrap_fraction)?
            .with_oob_mode(if self.oob { OobMode::Enabled } else { OobMode::Disabled }))
    }
}

/// Held-out evaluation of a trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub train_records: usize,
    pub validation_records: usize,
    /// Records dropped for missing features before the split.
    pub dropped_records: usize,
    pub confusion: BinaryConfusion,
    pub metrics: BinaryMetrics,
    /// Descending, non-negative.
    pub importances: Vec<RankedFeature>,
    /// Out-of-bag estimate on the training partition.
    pub oob: Option<OobScore>,
}

/// A fitted forest and its evaluation.
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    pub forest: RandomForest,
    pub evaluation: Evaluation,
}

/// Split `set`, train on the training partition and evaluate on the rest.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::EmptyPartition`] | either partition is empty |
/// | [`ModelError::SingleClass`] | the training partition lacks a class |
/// | [`ModelError::Forest`] | forest training or prediction failed |
#[instrument(skip_all, fields(records = set.len(), n_trees = config.n_trees(), seed = config.seed()))]
pub fn train(set: &TrainingSet, config: &ClassifierConfig) -> Result<TrainedClassifier, ModelError> {
    let split = set.split(config.split_ratio, config.seed)?;
    let n_positive = split.train.iter().filter(|r| r.label).count();
    if n_positive == 0 {
        return Err(ModelError::SingleClass {
            partition: "training",
            class: "incident",
        });
    }
    if n_positive == split.train.len() {
        return Err(ModelError::SingleClass {
            partition: "training",
            class: "background",
        });
    }

    let (features, labels) = columns(&split.train);
    let result = config
        .forest_config()?
        .fit(&features, &labels, set.band_names())?;
    let confusion = evaluate(result.forest(), &split.validation)?;
    let metrics = confusion.metrics();
    info!(
        accuracy = metrics.accuracy,
        precision = ?metrics.precision,
        recall = ?metrics.recall,
        f1 = metrics.f1,
        oob_accuracy = ?result.oob_score().map(|o| o.accuracy),
        "classifier evaluated"
    );

    let evaluation = Evaluation {
        train_records: split.train.len(),
        validation_records: split.validation.len(),
        dropped_records: set.dropped(),
        confusion,
        metrics,
        importances: result.importances().to_vec(),
        oob: result.oob_score().cloned(),
    };
    Ok(TrainedClassifier {
        forest: result.into_forest(),
        evaluation,
    })
}

/// Confusion matrix of `forest` over `records`.
///
/// # Errors
///
/// Returns [`ModelError::Forest`] when a record's width does not match the forest.
pub fn evaluate(forest: &RandomForest, records: &[LabeledRecord]) -> Result<BinaryConfusion, ModelError> {
    let (features, labels) = columns(records);
    let predicted = forest.predict_batch(&features)?;
    Ok(BinaryConfusion::from_pairs(predicted.into_iter().zip(labels)))
}

/// Label (0/1) and incident-probability rasters over a stack.
#[derive(Debug, Clone)]
pub struct ClassifiedRasters {
    pub labels: Raster,
    pub probability: Raster,
}

/// Classify every pixel of `stack`; pixels with a missing band stay no-data.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::BandMismatch`] | stack bands differ from the forest's features |
/// | [`ModelError::Forest`] | prediction failed |
#[instrument(skip_all, fields(grid = %stack.grid()))]
pub fn apply(forest: &RandomForest, stack: &FeatureStack) -> Result<ClassifiedRasters, ModelError> {
    let names = stack.band_names();
    if names != forest.feature_names() {
        return Err(ModelError::BandMismatch {
            stack: names,
            model: forest.feature_names().to_vec(),
        });
    }
    let grid = *stack.grid();
    let rows: Vec<Vec<f64>> = (0..grid.rows())
        .into_par_iter()
        .map(|r| {
            (0..grid.cols())
                .map(|c| match stack.pixel(grid.index(r, c)) {
                    Some(features) => forest.probability(&features),
                    None => Ok(f64::NAN),
                })
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect::<Result<_, _>>()?;
    let probability: Vec<f64> = rows.into_iter().flatten().collect();
    let labels: Vec<f64> = probability
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else if p > 0.5 { 1.0 } else { 0.0 })
        .collect();
    let classified = ClassifiedRasters {
        labels: Raster::new(grid, labels)?,
        probability: Raster::new(grid, probability)?,
    };
    info!(
        classified = classified.probability.valid_count(),
        positive = classified.labels.valid_values().filter(|&v| v > 0.5).count(),
        "stack classified"
    );
    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_validation() {
        let c = ClassifierConfig::default();
        assert_eq!(c.n_trees(), 50);
        assert_eq!(c.split_ratio(), 0.7);
        assert_eq!(c.seed(), 42);
        assert!(c.with_n_trees(0).is_err());
        assert!(c.with_split_ratio(0.0).is_err());
        assert!(c.with_split_ratio(f64::NAN).is_err());
        assert!(c.with_bootstrap_fraction(1.5).is_err());
        assert!(c.with_bootstrap_fraction(0.5).is_ok());
    }

    #[test]
    fn evaluate_tabulates_predictions() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i) / 10.0]).collect();
        let labels: Vec<bool> = (0..10).map(|i| i >= 5).collect();
        let forest = RandomForestConfig::new(25)
            .unwrap()
            .with_oob_mode(OobMode::Disabled)
            .fit(&features, &labels, &["slope".to_string()])
            .unwrap()
            .into_forest();
        let record = |x: f64, label| LabeledRecord {
            location: geo::Point::new(0.0, 0.0),
            features: vec![x],
            label,
        };
        let m = evaluate(&forest, &[record(0.0, false), record(0.95, true), record(0.9, false)]).unwrap();
        assert_eq!(m.true_negative, 1);
        assert_eq!(m.true_positive, 1);
        assert_eq!(m.false_positive, 1);
        assert_eq!(m.total(), 3);
    }
}
