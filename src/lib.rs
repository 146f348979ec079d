//! Edumind - learning analytics for an education platform
//!
//! This crate provides:
//! - Learning-style detection (k-means over behavioural signals)
//! - Performance prediction (random forest over academic signals)
//! - Versioned, atomically persisted model storage with rollback
//! - Lexicon-based sentiment scoring of free-text feedback
//! - A caller-owned service facade and a CLI
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`features`] - Record → feature vector extraction
//! - [`preprocessing`] - Standardisation and PCA projection
//! - [`training`] - K-means, decision trees, random forests, metrics
//! - [`pipelines`] - Learning-style detector and performance predictor
//! - [`sentiment`] - Lexicon sentiment analyzer
//!
//! ## Infrastructure
//! - [`store`] - Model bundles, registry and in-memory cache
//! - [`config`] - Pipeline configuration
//! - [`utils`] - Record loading (JSON, JSON lines, CSV)
//!
//! ## Services
//! - [`service`] - [`EdumindService`] facade
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod features;
pub mod preprocessing;
pub mod training;
pub mod pipelines;
pub mod sentiment;

// Infrastructure
pub mod store;
pub mod utils;

// Services
pub mod service;
pub mod cli;

pub use error::{EdumindError, ErrorResponse, Result};
pub use service::EdumindService;

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EdumindError, ErrorResponse, Result};

    // Configuration
    pub use crate::config::{ClassWeight, EdumindConfig, LearningStyleConfig, PerformanceConfig};

    // Features
    pub use crate::features::{FeatureSchema, FeatureVector, Record, RecordExtractor};

    // Pipelines
    pub use crate::pipelines::{
        LearningStyle, LearningStyleDetector, LearningStylePrediction, PerformanceLevel,
        PerformancePrediction, PerformancePredictor, TrainingReport,
    };

    // Sentiment
    pub use crate::sentiment::{OverallSentiment, SentimentAnalyzer, SentimentLabel, SentimentResult};

    // Store
    pub use crate::store::{ModelBundle, ModelKind, ModelRegistry, VersionInfo};

    // Training
    pub use crate::training::ClassificationMetrics;

    // Service
    pub use crate::service::{EdumindService, ModelInfo, PipelineInfo};

    // Loading
    pub use crate::utils::{LabeledRecords, RecordLoader};
}
