//! Caller-facing service
//!
//! `EdumindService` is constructed explicitly by its caller and owns the
//! registry plus one detector, predictor and sentiment analyzer. Several
//! services over different model directories can coexist in one process.

use crate::config::EdumindConfig;
use crate::error::{EdumindError, Result};
use crate::features::Record;
use crate::pipelines::{
    LearningStyle, LearningStyleDetector, LearningStylePrediction, PerformanceLevel,
    PerformancePrediction, PerformancePredictor,
};
use crate::sentiment::{OverallSentiment, SentimentAnalyzer, SentimentResult};
use crate::store::{ModelKind, ModelRegistry, VersionInfo};
use crate::training::ClassificationMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Summary of one pipeline's active model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub kind: ModelKind,
    pub algorithm: String,
    pub n_features: usize,
    pub outputs: Vec<String>,
    pub active_version: Option<u64>,
    pub trained_at: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentInfo {
    pub algorithm: String,
    pub labels: Vec<String>,
}

/// Model summary for every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub learning_style: PipelineInfo,
    pub performance: PipelineInfo,
    pub sentiment: SentimentInfo,
}

pub struct EdumindService {
    config: EdumindConfig,
    registry: Arc<ModelRegistry>,
    learning_style: LearningStyleDetector,
    performance: PerformancePredictor,
    sentiment: SentimentAnalyzer,
}

impl EdumindService {
    /// Validate the configuration and open the registry under `model_dir`
    pub fn new(config: EdumindConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ModelRegistry::open(&config.model_dir)?);
        info!(model_dir = %config.model_dir.display(), "Model registry opened");

        Ok(Self {
            learning_style: LearningStyleDetector::new(config.learning_style.clone(), Arc::clone(&registry)),
            performance: PerformancePredictor::new(config.performance.clone(), Arc::clone(&registry)),
            sentiment: SentimentAnalyzer::new(),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &EdumindConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn learning_style(&self) -> &LearningStyleDetector {
        &self.learning_style
    }

    pub fn performance(&self) -> &PerformancePredictor {
        &self.performance
    }

    pub fn sentiment(&self) -> &SentimentAnalyzer {
        &self.sentiment
    }

    pub fn predict_learning_style(&self, record: &Record) -> Result<LearningStylePrediction> {
        self.learning_style.predict(record)
    }

    pub fn predict_performance(&self, record: &Record) -> Result<PerformancePrediction> {
        self.performance.predict(record)
    }

    /// Train and publish a learning-style model; returns its version
    pub fn train_learning_style(&self, records: &[Record]) -> Result<u64> {
        Ok(self.learning_style.train(records)?.version())
    }

    /// Train, evaluate and publish a performance model
    pub fn train_performance<S: AsRef<str>>(
        &self,
        records: &[Record],
        labels: &[S],
    ) -> Result<ClassificationMetrics> {
        Ok(self.performance.train(records, labels)?.metrics)
    }

    pub fn analyze_sentiment(&self, text: &str) -> SentimentResult {
        self.sentiment.analyze(text)
    }

    pub fn overall_sentiment<S: AsRef<str>>(&self, texts: &[S]) -> OverallSentiment {
        self.sentiment.overall_sentiment(texts)
    }

    pub fn list_versions(&self, kind: ModelKind) -> Vec<VersionInfo> {
        self.registry.list_versions(kind)
    }

    /// Move a pipeline's active version back and reload it
    pub fn rollback(&self, kind: ModelKind, version: Option<u64>) -> Result<u64> {
        match kind {
            ModelKind::LearningStyle => self.learning_style.rollback(version),
            ModelKind::Performance => self.performance.rollback(version),
        }
    }

    /// Describe both pipelines; untrained pipelines report no version
    pub fn model_info(&self) -> Result<ModelInfo> {
        let style = match self.learning_style.bundle() {
            Ok(b) => Some((b.version(), b.header.trained_at, b.header.metrics.clone())),
            Err(EdumindError::ModelNotTrained) => None,
            Err(e) => return Err(e),
        };
        let performance = match self.performance.bundle() {
            Ok(b) => Some((b.version(), b.header.trained_at, b.header.metrics.clone())),
            Err(EdumindError::ModelNotTrained) => None,
            Err(e) => return Err(e),
        };

        let describe = |kind: ModelKind,
                        algorithm: &str,
                        n_features: usize,
                        outputs: Vec<String>,
                        active: Option<(u64, DateTime<Utc>, BTreeMap<String, f64>)>| {
            let (active_version, trained_at, metrics) = match active {
                Some((v, t, m)) => (Some(v), Some(t), m),
                None => (None, None, BTreeMap::new()),
            };
            PipelineInfo {
                kind,
                algorithm: algorithm.to_string(),
                n_features,
                outputs,
                active_version,
                trained_at,
                metrics,
            }
        };

        Ok(ModelInfo {
            learning_style: describe(
                ModelKind::LearningStyle,
                "k-means (4 clusters) over standardised, PCA-projected features",
                self.learning_style.schema().len(),
                LearningStyle::NAMES.iter().map(|s| s.to_string()).collect(),
                style,
            ),
            performance: describe(
                ModelKind::Performance,
                "random forest with balanced class weights",
                self.performance.schema().len(),
                PerformanceLevel::NAMES.iter().map(|s| s.to_string()).collect(),
                performance,
            ),
            sentiment: SentimentInfo {
                algorithm: "lexicon polarity with negation and intensifiers".to_string(),
                labels: vec!["positive".into(), "negative".into(), "neutral".into()],
            },
        })
    }
}
