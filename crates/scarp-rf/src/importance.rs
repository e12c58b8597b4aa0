//! Feature importance aggregation across trees.

use serde::{Deserialize, Serialize};

/// A feature with its normalized importance and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub name: String,
    /// Non-negative; all features together sum to 1 (or all 0 when no tree split).
    pub importance: f64,
    /// 1 = most important.
    pub rank: usize,
}

/// Sum per-tree MDI vectors, normalize, and sort descending.
///
/// Ties keep the input column order.
pub(crate) fn aggregate_importances(per_tree: &[Vec<f64>], names: &[String]) -> Vec<RankedFeature> {
    let mut totals = vec![0.0f64; names.len()];
    for tree in per_tree {
        for (total, &v) in totals.iter_mut().zip(tree) {
            *total += v;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }

    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(totals)
        .map(|(name, importance)| RankedFeature {
            name: name.clone(),
            importance,
            rank: 0,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, feature) in ranked.iter_mut().enumerate() {
        feature.rank = i + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_normalizes_and_ranks() {
        let names: Vec<String> = ["slope", "clay", "elev"].map(String::from).to_vec();
        let ranked = aggregate_importances(&[vec![0.5, 0.0, 0.5], vec![1.0, 0.0, 0.0]], &names);
        assert_eq!(ranked[0].name, "slope");
        assert!((ranked[0].importance - 0.75).abs() < 1e-12);
        assert_eq!(ranked[1].name, "elev");
        assert_eq!(ranked[2].rank, 3);
        assert!(ranked.iter().all(|f| f.importance >= 0.0));
    }

    #[test]
    fn all_zero_stays_zero() {
        let names = vec!["a".to_string(), "b".to_string()];
        let ranked = aggregate_importances(&[vec![0.0, 0.0]], &names);
        assert!(ranked.iter().all(|f| f.importance == 0.0));
        assert_eq!(ranked[0].name, "a");
    }
}
