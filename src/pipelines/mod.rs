//! Prediction pipelines: feature extraction → preprocessing → model → label

pub mod learning_style;
pub mod performance;

pub use learning_style::{
    derive_label_mapping, ClusterProfile, LearningStyle, LearningStyleBundle, LearningStyleDetector,
    LearningStyleModel, LearningStylePrediction, STYLE_SIGNALS,
};
pub use performance::{
    PerformanceBundle, PerformanceLevel, PerformanceModel, PerformancePrediction,
    PerformancePredictor, TrainingReport,
};
