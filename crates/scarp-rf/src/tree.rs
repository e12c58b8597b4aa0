use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::RfError;
use crate::config::invalid;
use crate::node::{ClassCounts, Node, NodeIndex};
use crate::split::{SplitContext, SplitCriterion, SplitMethod};

/// Growth parameters for one CART tree.
///
/// A node is split only while it holds at least `2 · min_samples_leaf`
/// records, is impure, and sits above `max_depth`.
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
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

    /// Limit depth; the root is depth 0.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Features tried per split; `None` tries all of them.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), RfError> {
        if self.max_depth == Some(0) {
            return Err(invalid("max_depth", 0.0));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", 0.0));
        }
        Ok(())
    }

    /// Train a tree on row-major `features` with boolean labels
    /// (`true` = incident).
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                            |
    /// |-------------------------------------|-------------------------------------------------|
    /// | [`RfError::EmptyDataset`]           | `features` is empty                             |
    /// | [`RfError::LabelCountMismatch`]     | `labels.len() != features.len()`                |
    /// | [`RfError::ZeroFeatures`]           | rows have no columns                            |
    /// | [`RfError::FeatureCountMismatch`]   | rows have inconsistent lengths                  |
    /// | [`RfError::NonFiniteValue`]         | any value is NaN or infinite                    |
    /// | [`RfError::InvalidMaxFeatures`]     | `max_features` outside `[1, n_features]`        |
    /// | [`RfError::InvalidParameter`]       | `max_depth` or `min_samples_leaf` is zero       |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[bool]) -> Result<DecisionTree, RfError> {
        let n_features = check_training_data(features, labels)?;
        self.validate()?;
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();
        let indices: Vec<usize> = (0..features.len()).collect();
        Ok(self.fit_columns(&columns, labels, &indices, max_features))
    }

    /// Grow a tree on pre-validated column-major data restricted to `indices`.
    pub(crate) fn fit_columns(
        &self,
        columns: &[Vec<f64>],
        labels: &[bool],
        indices: &[usize],
        max_features: usize,
    ) -> DecisionTree {
        let ctx = SplitContext {
            columns,
            labels,
            criterion: self.criterion,
            method: self.split_method,
            max_features,
            min_samples_leaf: self.min_samples_leaf,
        };
        let mut builder = TreeBuilder {
            ctx,
            config: self,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        builder.grow(indices, 0);
        debug!(n_nodes = builder.arena.len(), "decision tree built");
        DecisionTree {
            nodes: builder.arena,
            n_features: columns.len(),
        }
    }
}

/// Validate a row-major training set and return its feature count.
pub(crate) fn check_training_data(features: &[Vec<f64>], labels: &[bool]) -> Result<usize, RfError> {
    let first = features.first().ok_or(RfError::EmptyDataset)?;
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

struct TreeBuilder<'a> {
    ctx: SplitContext<'a>,
    config: &'a DecisionTreeConfig,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: &[usize], depth: usize) -> NodeIndex {
        let counts = ClassCounts::of(self.ctx.labels, indices);
        let impurity = self.config.criterion.impurity(counts);
        let n_samples = indices.len();
        let leaf = Node::Leaf {
            positive_fraction: counts.positive_fraction(),
            impurity,
            n_samples,
        };

        let stop = n_samples < 2 * self.config.min_samples_leaf
            || impurity.value() == 0.0
            || self.config.max_depth.is_some_and(|d| depth >= d);
        let split = if stop {
            None
        } else {
            self.ctx.find_best_split(indices, &mut self.rng)
        };

        let slot = self.arena.len();
        self.arena.push(leaf);
        let Some(split) = split else {
            return NodeIndex::new(slot);
        };

        // the placeholder leaf at `slot` is replaced once both children exist
        let left = self.grow(&split.left_indices, depth + 1);
        let right = self.grow(&split.right_indices, depth + 1);
        self.arena[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(slot)
    }
}

/// A fitted binary CART tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Share of positive training samples in the leaf reached by `sample`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn probability(&self, sample: &[f64]) -> Result<f64, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.leaf_fraction(sample))
    }

    /// Majority vote of the reached leaf; ties go to the negative class.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<bool, RfError> {
        Ok(self.probability(sample)? > 0.5)
    }

    /// Mean Decrease in Impurity per feature, normalized to sum to 1
    /// (all zeros for a single-leaf tree).
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Longest root-to-leaf path; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    fn leaf_fraction(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf {
                    positive_fraction, ..
                } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}
