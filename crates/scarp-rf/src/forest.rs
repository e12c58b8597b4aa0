//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::importance::{RankedFeature, aggregate_importances};
use crate::oob::{OobScore, compute_oob};
use crate::tree::{DecisionTree, DecisionTreeConfig, check_training_data};

/// A fitted ensemble of CART trees over named factor bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// What [`RandomForestConfig::fit`] returns: the forest plus the
/// diagnostics computed while growing it.
#[derive(Debug)]
pub struct ForestFit {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
    oob_score: Option<OobScore>,
    n_samples: usize,
    n_positive: usize,
}

impl ForestFit {
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Mean decrease in impurity per band, highest first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// `None` when OOB scoring was disabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Incident records among the training set.
    #[must_use]
    pub fn n_positive(&self) -> usize {
        self.n_positive
    }
}

/// Draw `draw_count` record indices with replacement; the second list holds
/// the records never drawn.
fn bootstrap(n_samples: usize, draw_count: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let mut drawn = Vec::with_capacity(draw_count);
    let mut seen = vec![false; n_samples];
    for _ in 0..draw_count {
        let i = rng.gen_range(0..n_samples);
        seen[i] = true;
        drawn.push(i);
    }
    let left_out = seen
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| (!s).then_some(i))
        .collect();
    (drawn, left_out)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[bool],
    feature_names: &[String],
) -> Result<ForestFit, RfError> {
    let n_features = check_training_data(features, labels)?;
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameMismatch {
            n_names: feature_names.len(),
            n_features,
        });
    }
    let max_features = config.max_features.resolve(n_features)?;

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_split_method(config.split_method)
        .with_max_depth(config.max_depth)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let n_samples = features.len();
    let n_positive = labels.iter().filter(|&&l| l).count();
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;
    info!(
        n_trees = config.n_trees,
        n_samples,
        n_positive,
        n_features,
        max_features,
        draw_count,
        "training random forest"
    );

    // Column-major copy shared by all trees; bootstraps are index lists into it.
    let columns: Vec<Vec<f64>> = (0..n_features)
        .map(|f| features.iter().map(|row| row[f]).collect())
        .collect();

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let grown: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bag, oob) = bootstrap(n_samples, draw_count, &mut rng);
            let tree = tree_config
                .clone()
                .with_seed(rng.r#gen())
                .fit_columns(&columns, labels, &bag, max_features);
            (tree, oob)
        })
        .collect();
    let (trees, oob_indices_per_tree): (Vec<_>, Vec<_>) = grown.into_iter().unzip();
    debug!(n_trees_trained = trees.len(), "tree training complete");

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, features, labels, &oob_indices_per_tree)?),
        OobMode::Disabled => None,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    Ok(ForestFit {
        forest: RandomForest {
            trees,
            n_features,
            feature_names: feature_names.to_vec(),
        },
        importances,
        oob_score,
        n_samples,
        n_positive,
    })
}
