//! Scoring pixels with a fitted forest.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;

impl RandomForest {
    /// Incident probability of one pixel: the mean positive fraction of the
    /// leaves it reaches, one per tree.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample` is not
    /// exactly one value per band.
    pub fn probability(&self, sample: &[f64]) -> Result<f64, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.probability(sample))
            .sum::<Result<f64, RfError>>()?;
        Ok(total / self.trees.len() as f64)
    }

    /// `true` (incident) when the probability is above one half.
    ///
    /// # Errors
    ///
    /// See [`RandomForest::probability`].
    pub fn predict(&self, sample: &[f64]) -> Result<bool, RfError> {
        self.probability(sample).map(|p| p > 0.5)
    }

    /// Labels for many pixels, scored in parallel.
    ///
    /// # Errors
    ///
    /// Fails on the first pixel of the wrong width.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<bool>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Probabilities for many pixels, in input order.
    ///
    /// # Errors
    ///
    /// Fails on the first pixel of the wrong width.
    pub fn probability_batch(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.probability(sample))
            .collect()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Band names in training column order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

#[cfg(test)]
mod tests {
    use crate::RfError;
    use crate::config::RandomForestConfig;

    fn fitted() -> crate::RandomForest {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 20.0]).collect();
        let labels: Vec<bool> = (0..20).map(|i| i >= 10).collect();
        RandomForestConfig::new(15)
            .unwrap()
            .fit(&features, &labels, &["elev".to_string()])
            .unwrap()
            .into_forest()
    }

    #[test]
    fn probabilities_are_in_unit_interval_and_ordered() {
        let forest = fitted();
        let low = forest.probability(&[0.0]).unwrap();
        let high = forest.probability(&[0.99]).unwrap();
        assert!((0.0..=1.0).contains(&low) && (0.0..=1.0).contains(&high));
        assert!(high > low);
        assert!(forest.predict(&[0.99]).unwrap());
    }

    #[test]
    fn batch_matches_single() {
        let forest = fitted();
        let samples: Vec<Vec<f64>> = (0..7).map(|i| vec![i as f64 / 7.0]).collect();
        let batch = forest.probability_batch(&samples).unwrap();
        for (sample, p) in samples.iter().zip(batch) {
            assert_eq!(forest.probability(sample).unwrap(), p);
        }
    }

    #[test]
    fn wrong_width_rejected() {
        let forest = fitted();
        assert!(matches!(
            forest.predict_batch(&[vec![0.1, 0.2]]),
            Err(RfError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }
}
