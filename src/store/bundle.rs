//! The persisted unit: preprocessing statistics plus a trained model

use crate::error::{EdumindError, Result};
use crate::features::FeatureSchema;
use crate::preprocessing::PreprocessingStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which pipeline a bundle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LearningStyle,
    Performance,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::LearningStyle, ModelKind::Performance];

    /// Stable name, also the registry directory
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LearningStyle => "learning_style",
            ModelKind::Performance => "performance",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EdumindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "learning_style" | "style" => Ok(ModelKind::LearningStyle),
            "performance" => Ok(ModelKind::Performance),
            other => Err(EdumindError::ConfigError(format!(
                "Unknown model kind: {} (expected learning_style or performance)",
                other
            ))),
        }
    }
}

/// Metadata stored in front of every bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleHeader {
    pub kind: ModelKind,
    /// Registry version; 0 until published
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    /// Feature schema name and version the model was trained against
    pub schema: String,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    /// Evaluation or fit metrics recorded at training time
    pub metrics: BTreeMap<String, f64>,
}

/// A trained model together with the exact transform it was fitted on.
/// Read-only once written; retraining produces a new bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle<M> {
    pub header: BundleHeader,
    pub statistics: PreprocessingStatistics,
    pub model: M,
}

impl<M> ModelBundle<M> {
    pub fn new(
        kind: ModelKind,
        schema: &FeatureSchema,
        statistics: PreprocessingStatistics,
        model: M,
    ) -> Self {
        Self {
            header: BundleHeader {
                kind,
                version: 0,
                trained_at: Utc::now(),
                schema: schema.name.to_string(),
                schema_version: schema.version,
                feature_names: schema.names(),
                metrics: BTreeMap::new(),
            },
            statistics,
            model,
        }
    }

    /// Attach training metrics
    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.header.metrics = metrics;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.header.kind
    }

    pub fn version(&self) -> u64 {
        self.header.version
    }

    /// Reject a bundle whose feature layout differs from what the current
    /// extractor produces
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        let expected = self.statistics.n_features();
        if expected != schema.len()
            || self.header.feature_names.len() != schema.len()
            || self.header.feature_names != schema.names()
        {
            return Err(EdumindError::FeatureShapeMismatch {
                expected,
                actual: schema.len(),
            });
        }
        Ok(())
    }
}
