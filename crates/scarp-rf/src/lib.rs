//! Random Forest for telling incident pixels from background pixels.
//!
//! Trees grow in parallel from seeded bootstraps, so a seed fixes the whole
//! forest. A fit also yields band importances and an out-of-bag score, and a
//! forest round-trips through a versioned bincode file.

mod config;
mod error;
mod forest;
mod importance;
mod node;
mod oob;
mod predict;
mod serialize;
mod split;
mod tree;

pub use config::{DEFAULT_N_TREES, MaxFeatures, OobMode, RandomForestConfig};
pub use error::RfError;
pub use forest::{ForestFit, RandomForest};
pub use importance::RankedFeature;
pub use node::{ClassCounts, FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use serialize::MODEL_FORMAT_VERSION;
pub use split::{SplitCriterion, SplitMethod};
pub use tree::{DecisionTree, DecisionTreeConfig};
