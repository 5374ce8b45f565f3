//! Random Forest classification over typed tabular data.
//!
//! Gini-driven CART trees on continuous and discrete attributes, bootstrap
//! bagging, Random Forest ensembles with per-tree out-of-bag evaluation,
//! confusion-matrix statistics streamed to a sink, model persistence, and a
//! cascaded forest built on top of the ensemble trainer.

mod bootstrap;
mod cascade;
mod config;
mod confusion;
mod error;
mod forest;
pub mod gini;
mod node;
mod serialize;
mod sink;
mod stats;
mod tree;

pub use bootstrap::{bootstrap, BootstrapSample, Sampling};
pub use cascade::{CascadeConfig, CascadedForest, Stage};
pub use config::{ForestConfig, RandomFeatures, DEFAULT_N_TREE, DEFAULT_PERCENT_BOOT};
pub use confusion::{BinaryCounts, ClassMetrics, ConfusionMatrix, IndexGroups, Rates};
pub use error::ForestError;
pub use forest::{Classification, RandomForest, TreeReport};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex, SplitRule};
pub use sink::{CsvStatsWriter, NullSink, StatsSink};
pub use stats::{Stat, TrainingStats};
pub use tree::{DecisionTree, DecisionTreeConfig};
