//! Out-of-bag (OOB) evaluation.

use serde::{Deserialize, Serialize};

use crate::error::RfError;
use crate::tree::DecisionTree;

/// Out-of-bag evaluation of the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OobScore {
    /// Share of OOB-evaluated samples predicted correctly.
    pub accuracy: f64,
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
    /// Samples left out of at least one bootstrap.
    pub n_oob_samples: usize,
}

/// Score each sample using only the trees that did not see it.
///
/// The OOB prediction is the mean leaf probability of those trees; samples
/// that were in every bootstrap are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[bool],
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let n_samples = features.len();
    let mut sums = vec![0.0f64; n_samples];
    let mut votes = vec![0usize; n_samples];

    for (tree, oob) in trees.iter().zip(oob_indices_per_tree) {
        for &i in oob {
            sums[i] += tree.probability(&features[i])?;
            votes[i] += 1;
        }
    }

    let mut score = OobScore {
        accuracy: 0.0,
        true_positive: 0,
        false_positive: 0,
        false_negative: 0,
        true_negative: 0,
        n_oob_samples: 0,
    };
    for i in (0..n_samples).filter(|&i| votes[i] > 0) {
        let predicted = sums[i] / votes[i] as f64 > 0.5;
        match (labels[i], predicted) {
            (true, true) => score.true_positive += 1,
            (false, true) => score.false_positive += 1,
            (true, false) => score.false_negative += 1,
            (false, false) => score.true_negative += 1,
        }
        score.n_oob_samples += 1;
    }

    if score.n_oob_samples == 0 {
        return Err(RfError::NoOutOfBagSamples);
    }
    score.accuracy =
        (score.true_positive + score.true_negative) as f64 / score.n_oob_samples as f64;
    Ok(score)
}
