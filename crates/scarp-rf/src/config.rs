//! Forest training parameters.

use crate::error::RfError;
use crate::forest::ForestFit;
use crate::split::{SplitCriterion, SplitMethod};

/// Trees grown when no count is given.
pub const DEFAULT_N_TREES: usize = 50;

/// Bands tried at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_bands))`; 3 of the 6 factor bands.
    Sqrt,
    /// `ceil(fraction · n_bands)`, fraction in (0, 1].
    Fraction(f64),
    /// Every band.
    All,
}

impl MaxFeatures {
    /// Band count for a stack of `n_features` bands.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidMaxFeatures`] if the count falls outside `[1, n_features]`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let resolved = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Whether to score the training records out of bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    Enabled,
    Disabled,
}

/// Random Forest training parameters.
///
/// Setters that take a bounded value validate it immediately, so a config
/// that exists is always trainable.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `n_trees`            | 50          |
/// | `max_features`       | `Sqrt`      |
/// | `max_depth`          | `None`      |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `split_method`       | `Exact`     |
/// | `seed`               | 42          |
/// | `oob_mode`           | `Enabled`   |
/// | `bootstrap_fraction` | 1.0         |
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            seed: 42,
            oob_mode: OobMode::Enabled,
            bootstrap_fraction: 1.0,
        }
    }
}

impl RandomForestConfig {
    /// A config growing `n_trees` trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidParameter`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(invalid("n_trees", 0.0));
        }
        Ok(Self {
            n_trees,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Limit tree depth; `None` grows until the leaves are pure.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidParameter`] for `Some(0)`.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Result<Self, RfError> {
        if max_depth == Some(0) {
            return Err(invalid("max_depth", 0.0));
        }
        self.max_depth = max_depth;
        Ok(self)
    }

    /// Smallest number of records a leaf may hold.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidParameter`] for zero.
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Result<Self, RfError> {
        if min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", 0.0));
        }
        self.min_samples_leaf = min_samples_leaf;
        Ok(self)
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Share of the training records drawn (with replacement) per tree.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidParameter`] outside (0, 1].
    pub fn with_bootstrap_fraction(mut self, fraction: f64) -> Result<Self, RfError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid("bootstrap_fraction", fraction));
        }
        self.bootstrap_fraction = fraction;
        Ok(self)
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    #[must_use]
    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Train a forest on row-major records; `labels[i]` is `true` for an
    /// incident and `false` for a background point.
    ///
    /// # Errors
    ///
    /// | Variant                          | When                                             |
    /// |----------------------------------|--------------------------------------------------|
    /// | [`RfError::EmptyDataset`]        | `features` is empty                              |
    /// | [`RfError::LabelCountMismatch`]  | `labels` and `features` differ in length         |
    /// | [`RfError::FeatureNameMismatch`] | `feature_names` does not match the column count  |
    /// | [`RfError::ZeroFeatures`]        | records have no bands                            |
    /// | [`RfError::FeatureCountMismatch`]| records have inconsistent widths                 |
    /// | [`RfError::NonFiniteValue`]      | any value is NaN or infinite                     |
    /// | [`RfError::InvalidMaxFeatures`]  | resolved max_features is outside [1, n_features] |
    /// | [`RfError::NoOutOfBagSamples`]   | OOB enabled but no record was ever left out      |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[bool],
        feature_names: &[String],
    ) -> Result<ForestFit, RfError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}

pub(crate) fn invalid(parameter: &'static str, value: f64) -> RfError {
    RfError::InvalidParameter { parameter, value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_of_six_bands_is_three() {
        assert_eq!(MaxFeatures::Sqrt.resolve(6).unwrap(), 3);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(6).unwrap(), 3);
        assert_eq!(MaxFeatures::All.resolve(6).unwrap(), 6);
        assert!(MaxFeatures::Fraction(0.0).resolve(6).is_err());
    }

    #[test]
    fn default_grows_fifty_trees() {
        let c = RandomForestConfig::default();
        assert_eq!(c.n_trees(), DEFAULT_N_TREES);
        assert_eq!(c.seed(), 42);
        assert_eq!(c.oob_mode(), OobMode::Enabled);
    }

    #[test]
    fn setters_reject_out_of_range_values() {
        let c = RandomForestConfig::default();
        assert!(RandomForestConfig::new(0).is_err());
        assert!(c.clone().with_max_depth(Some(0)).is_err());
        assert!(c.clone().with_max_depth(None).is_ok());
        assert!(c.clone().with_min_samples_leaf(0).is_err());
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            assert!(matches!(
                c.clone().with_bootstrap_fraction(bad),
                Err(RfError::InvalidParameter {
                    parameter: "bootstrap_fraction",
                    ..
                })
            ));
        }
        assert!(c.with_bootstrap_fraction(0.6).is_ok());
    }
}
