//! Random Forest landslide classifier over the normalized factor bands.
//!
//! Observed incidents (positives) and synthetic points (negatives) are read
//! from a [`FeatureStack`], split with a seeded per-record draw, used to
//! train a forest, evaluated on the held-out records, and finally applied
//! to every pixel as a label raster and a probability raster.

pub mod classifier;
pub mod error;
pub mod stack;
pub mod training;

pub use classifier::{ClassifiedRasters, ClassifierConfig, Evaluation, TrainedClassifier, apply, evaluate, train};
pub use error::ModelError;
pub use stack::FeatureStack;
pub use training::{LabeledRecord, Split, TrainingSet};
