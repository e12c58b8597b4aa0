use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based feature column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node in a tree's `Vec<Node>` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node impurity under the configured criterion.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Negative/positive tally of the samples reaching a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    /// Tally the labels of `indices`.
    #[must_use]
    pub fn of(labels: &[bool], indices: &[usize]) -> Self {
        let positive = indices.iter().filter(|&&i| labels[i]).count();
        Self {
            negative: indices.len() - positive,
            positive,
        }
    }

    #[must_use]
    pub fn total(self) -> usize {
        self.negative + self.positive
    }

    /// Share of positives, 0 for an empty tally.
    #[must_use]
    pub fn positive_fraction(self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.positive as f64 / n as f64,
        }
    }

    pub(crate) fn add(&mut self, label: bool) {
        if label {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    pub(crate) fn remove(&mut self, label: bool) {
        if label {
            self.positive -= 1;
        } else {
            self.negative -= 1;
        }
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeIndex`], so a tree is a flat
/// `Vec<Node>` that serializes as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Interior split: `sample[feature] <= threshold` goes left.
    Split {
        feature: FeatureIndex,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        impurity: Impurity,
        n_samples: usize,
        /// Weighted impurity decrease credited to `feature`.
        impurity_decrease: f64,
    },
    /// Terminal node.
    Leaf {
        /// Share of positive training samples in the leaf.
        positive_fraction: f64,
        impurity: Impurity,
        n_samples: usize,
    },
}

impl Node {
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_counts_tally_selected_indices() {
        let labels = [true, false, true, true, false];
        let c = ClassCounts::of(&labels, &[0, 1, 2]);
        assert_eq!(c, ClassCounts { negative: 1, positive: 2 });
        assert!((c.positive_fraction() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(ClassCounts::default().positive_fraction(), 0.0);
    }

    #[test]
    fn add_and_remove_are_inverse() {
        let mut c = ClassCounts::default();
        c.add(true);
        c.add(false);
        c.remove(true);
        assert_eq!(c, ClassCounts { negative: 1, positive: 0 });
    }

    #[test]
    fn impurity_display() {
        assert_eq!(format!("{}", Impurity::new(0.333333)), "0.333333");
    }

    #[test]
    fn leaf_and_split_accessors() {
        let leaf = Node::Leaf {
            positive_fraction: 0.8,
            impurity: Impurity::new(0.32),
            n_samples: 10,
        };
        let split = Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 0.35,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: Impurity::new(0.48),
            n_samples: 20,
            impurity_decrease: 3.2,
        };
        assert!(leaf.is_leaf());
        assert!(!split.is_leaf());
        assert_eq!(split.n_samples(), 20);
        assert!((leaf.impurity().value() - 0.32).abs() < f64::EPSILON);
    }
}
