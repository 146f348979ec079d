//! Error types for the edumind pipelines

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for edumind operations
pub type Result<T> = std::result::Result<T, EdumindError>;

/// Main error type for the learning-style and performance pipelines
#[derive(Error, Debug)]
pub enum EdumindError {
    #[error("Invalid record: field `{field}` {reason}")]
    InvalidRecord { field: String, reason: String },

    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Label mismatch: {records} records but {labels} labels")]
    LabelMismatch { records: usize, labels: usize },

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Feature shape mismatch: model expects {expected} features, got {actual}")]
    FeatureShapeMismatch { expected: usize, actual: usize },

    #[error("Model file not found: {}", .0.display())]
    ModelFileNotFound(PathBuf),

    #[error("Corrupt model file {}: {reason}", path.display())]
    CorruptModelFile { path: PathBuf, reason: String },

    #[error("Version not found: {model} v{version}")]
    VersionNotFound { model: String, version: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EdumindError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            EdumindError::InvalidRecord { .. } => "invalid_record",
            EdumindError::EmptyTrainingSet => "empty_training_set",
            EdumindError::InsufficientData { .. } => "insufficient_data",
            EdumindError::LabelMismatch { .. } => "label_mismatch",
            EdumindError::InvalidLabel(_) => "invalid_label",
            EdumindError::ModelNotTrained => "model_not_trained",
            EdumindError::FeatureShapeMismatch { .. } => "feature_shape_mismatch",
            EdumindError::ModelFileNotFound(_) => "model_file_not_found",
            EdumindError::CorruptModelFile { .. } => "corrupt_model_file",
            EdumindError::VersionNotFound { .. } => "version_not_found",
            EdumindError::ConfigError(_) => "config_error",
            EdumindError::DataError(_) => "data_error",
            EdumindError::TrainingError(_) => "training_error",
            EdumindError::SerializationError(_) => "serialization_error",
            EdumindError::IoError(_) => "io_error",
        }
    }

    /// Whether the caller can recover by training, reloading or rolling back
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EdumindError::ModelNotTrained
                | EdumindError::ModelFileNotFound(_)
                | EdumindError::CorruptModelFile { .. }
                | EdumindError::VersionNotFound { .. }
                | EdumindError::FeatureShapeMismatch { .. }
        )
    }
}

impl From<serde_json::Error> for EdumindError {
    fn from(err: serde_json::Error) -> Self {
        EdumindError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EdumindError {
    fn from(err: ndarray::ShapeError) -> Self {
        EdumindError::DataError(format!("invalid shape: {}", err))
    }
}

impl From<polars::error::PolarsError> for EdumindError {
    fn from(err: polars::error::PolarsError) -> Self {
        EdumindError::DataError(err.to_string())
    }
}

/// Caller-facing rendering of a failure: a message plus a machine-readable kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    pub recoverable: bool,
}

impl From<&EdumindError> for ErrorResponse {
    fn from(err: &EdumindError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}
