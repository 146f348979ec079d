//! Model training module
//!
//! Estimators behind the two pipelines:
//! - K-Means clustering (k-means++ seeding, restarts)
//! - Weighted decision trees and Random Forests
//! - Held-out splitting and classification metrics

pub mod clustering;
pub mod decision_tree;
pub mod metrics;
pub mod random_forest;
pub mod split;

pub use clustering::KMeans;
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use metrics::ClassificationMetrics;
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, TrainTestSplit};
