use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::node::{ClassCounts, FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// `1 - p² - q²`
    Gini,
    /// `-(p ln p + q ln q)`
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node with the given class tally; 0 for an empty node.
    #[must_use]
    pub fn impurity(&self, counts: ClassCounts) -> Impurity {
        let n = counts.total();
        if n == 0 {
            return Impurity::new(0.0);
        }
        let p = counts.positive as f64 / n as f64;
        let q = 1.0 - p;
        let value = match self {
            SplitCriterion::Gini => 1.0 - p * p - q * q,
            SplitCriterion::Entropy => -[p, q]
                .into_iter()
                .filter(|&x| x > 0.0)
                .map(|x| x * x.ln())
                .sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// How candidate thresholds are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Every midpoint between consecutive distinct values.
    #[default]
    Exact,
    /// One uniform random threshold per feature (Extremely Randomized Trees).
    ExtraTrees,
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// `n·I(parent) − n_l·I(left) − n_r·I(right)`.
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Inputs shared by every split search in one tree.
pub(crate) struct SplitContext<'a> {
    /// Column-major: `columns[feature][sample]`.
    pub(crate) columns: &'a [Vec<f64>],
    pub(crate) labels: &'a [bool],
    pub(crate) criterion: SplitCriterion,
    pub(crate) method: SplitMethod,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitContext<'_> {
    /// Find the best split of `indices` over `max_features` randomly chosen
    /// features, or `None` if no admissible split exists.
    pub(crate) fn find_best_split(
        &self,
        indices: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = self.columns.len();
        let n = indices.len();
        if n < 2 || n_features == 0 {
            return None;
        }
        let parent = ClassCounts::of(self.labels, indices);
        let parent_impurity = self.criterion.impurity(parent).value();

        // partial Fisher-Yates over the feature order
        let mut order: Vec<usize> = (0..n_features).collect();
        let take = self.max_features.min(n_features);
        for i in 0..take {
            let j = rng.gen_range(i..n_features);
            order.swap(i, j);
        }

        let mut best: Option<(FeatureIndex, f64, f64)> = None;
        for &feature in &order[..take] {
            let column = &self.columns[feature];
            let candidate = match self.method {
                SplitMethod::Exact => self.scan_exact(column, indices, parent, parent_impurity),
                SplitMethod::ExtraTrees => {
                    self.random_threshold(column, indices, parent_impurity, rng)
                }
            };
            if let Some((threshold, decrease)) = candidate
                && best.is_none_or(|(_, _, d)| decrease > d)
            {
                best = Some((FeatureIndex::new(feature), threshold, decrease));
            }
        }

        let (feature, threshold, impurity_decrease) = best?;
        let column = &self.columns[feature.index()];
        let (left_indices, right_indices) =
            indices.iter().copied().partition(|&i| column[i] <= threshold);
        Some(SplitResult {
            feature,
            threshold,
            impurity_decrease,
            left_indices,
            right_indices,
        })
    }

    fn weighted_decrease(&self, parent_impurity: f64, left: ClassCounts, right: ClassCounts) -> f64 {
        let n = (left.total() + right.total()) as f64;
        n * parent_impurity
            - left.total() as f64 * self.criterion.impurity(left).value()
            - right.total() as f64 * self.criterion.impurity(right).value()
    }

    fn scan_exact(
        &self,
        column: &[f64],
        indices: &[usize],
        parent: ClassCounts,
        parent_impurity: f64,
    ) -> Option<(f64, f64)> {
        let mut sorted: Vec<(f64, bool)> =
            indices.iter().map(|&i| (column[i], self.labels[i])).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = ClassCounts::default();
        let mut right = parent;
        let mut best: Option<(f64, f64)> = None;
        for w in 0..sorted.len() - 1 {
            let (value, label) = sorted[w];
            left.add(label);
            right.remove(label);
            let next = sorted[w + 1].0;
            if value == next
                || left.total() < self.min_samples_leaf
                || right.total() < self.min_samples_leaf
            {
                continue;
            }
            let decrease = self.weighted_decrease(parent_impurity, left, right);
            if best.is_none_or(|(_, d)| decrease > d) {
                best = Some(((value + next) / 2.0, decrease));
            }
        }
        best
    }

    fn random_threshold(
        &self,
        column: &[f64],
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut impl Rng,
    ) -> Option<(f64, f64)> {
        let (lo, hi) = indices
            .iter()
            .map(|&i| column[i])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if lo >= hi {
            return None;
        }
        let threshold = rng.gen_range(lo..hi);
        let mut left = ClassCounts::default();
        let mut right = ClassCounts::default();
        for &i in indices {
            if column[i] <= threshold {
                left.add(self.labels[i]);
            } else {
                right.add(self.labels[i]);
            }
        }
        if left.total() < self.min_samples_leaf || right.total() < self.min_samples_leaf {
            return None;
        }
        Some((threshold, self.weighted_decrease(parent_impurity, left, right)))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn context<'a>(
        columns: &'a [Vec<f64>],
        labels: &'a [bool],
        method: SplitMethod,
        min_samples_leaf: usize,
    ) -> SplitContext<'a> {
        SplitContext {
            columns,
            labels,
            criterion: SplitCriterion::Gini,
            method,
            max_features: columns.len(),
            min_samples_leaf,
        }
    }

    #[test]
    fn gini_of_pure_and_balanced_nodes() {
        let pure = ClassCounts { negative: 10, positive: 0 };
        let balanced = ClassCounts { negative: 5, positive: 5 };
        assert!(SplitCriterion::Gini.impurity(pure).value().abs() < f64::EPSILON);
        assert!((SplitCriterion::Gini.impurity(balanced).value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_of_balanced_node_is_ln2() {
        let balanced = ClassCounts { negative: 5, positive: 5 };
        let v = SplitCriterion::Entropy.impurity(balanced).value();
        assert!((v - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn separable_column_splits_between_the_groups() {
        let columns = vec![vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9]];
        let labels = [false, false, false, true, true, true];
        let indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let split = context(&columns, &labels, SplitMethod::Exact, 1)
            .find_best_split(&indices, &mut rng)
            .unwrap();
        assert!(split.threshold > 0.3 && split.threshold < 0.7);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
        assert!((split.impurity_decrease - 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_has_no_split() {
        let columns = vec![vec![0.5; 4]];
        let labels = [false, false, true, true];
        let indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for method in [SplitMethod::Exact, SplitMethod::ExtraTrees] {
            assert!(
                context(&columns, &labels, method, 1)
                    .find_best_split(&indices, &mut rng)
                    .is_none()
            );
        }
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let columns = vec![vec![0.0, 1.0]];
        let labels = [false, true];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(
            context(&columns, &labels, SplitMethod::Exact, 2)
                .find_best_split(&[0, 1], &mut rng)
                .is_none()
        );
    }

    #[test]
    fn extra_trees_threshold_lies_inside_the_range() {
        let columns = vec![vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9]];
        let labels = [false, false, false, true, true, true];
        let indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let split = context(&columns, &labels, SplitMethod::ExtraTrees, 1)
            .find_best_split(&indices, &mut rng)
            .unwrap();
        assert!(split.threshold >= 0.1 && split.threshold < 0.9);
        assert_eq!(split.left_indices.len() + split.right_indices.len(), 6);
    }
}
