//! Pipeline configuration

use crate::error::{EdumindError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Class weighting applied while fitting the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample counts once
    Uniform,
    /// Inverse class frequency: n_samples / (n_classes * count_c)
    Balanced,
}

/// Configuration for the learning-style detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningStyleConfig {
    /// PCA output dimensions (`None` disables the projection)
    pub n_components: Option<usize>,
    /// Maximum Lloyd iterations per k-means run
    pub max_iter: usize,
    /// Number of k-means restarts; the lowest inertia wins
    pub n_init: usize,
    /// Seed for initialisation and projection
    pub random_state: u64,
}

impl Default for LearningStyleConfig {
    fn default() -> Self {
        Self {
            n_components: Some(4),
            max_iter: 300,
            n_init: 10,
            random_state: 42,
        }
    }
}

impl LearningStyleConfig {
    /// Builder method to set the projection size
    pub fn with_n_components(mut self, n: Option<usize>) -> Self {
        self.n_components = n;
        self
    }

    /// Builder method to set the iteration cap
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Builder method to set the number of restarts
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_components == Some(0) {
            return Err(EdumindError::ConfigError(
                "learning_style.n_components must be at least 1".to_string(),
            ));
        }
        if self.max_iter == 0 || self.n_init == 0 {
            return Err(EdumindError::ConfigError(
                "learning_style.max_iter and n_init must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the performance predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Fraction of the batch held out for evaluation
    pub test_ratio: f64,
    /// Class weighting strategy
    pub class_weight: ClassWeight,
    /// Seed for the split, bootstrap and feature sampling
    pub random_state: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            test_ratio: 0.2,
            class_weight: ClassWeight::Balanced,
            random_state: 42,
        }
    }
}

impl PerformanceConfig {
    /// Builder method to set the forest size
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set the maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Builder method to set class weighting
    pub fn with_class_weight(mut self, weight: ClassWeight) -> Self {
        self.class_weight = weight;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(EdumindError::ConfigError(
                "performance.n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(EdumindError::ConfigError(format!(
                "performance.test_ratio must lie in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf == 0 {
            return Err(EdumindError::ConfigError(
                "performance.min_samples_split must be >= 2 and min_samples_leaf >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdumindConfig {
    /// Root directory of the model registry
    pub model_dir: PathBuf,
    pub learning_style: LearningStyleConfig,
    pub performance: PerformanceConfig,
}

impl Default for EdumindConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("ml_models"),
            learning_style: LearningStyleConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl EdumindConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file; absent keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EdumindError::ConfigError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EdumindError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the model directory
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    /// Builder method to replace the learning-style section
    pub fn with_learning_style(mut self, config: LearningStyleConfig) -> Self {
        self.learning_style = config;
        self
    }

    /// Builder method to replace the performance section
    pub fn with_performance(mut self, config: PerformanceConfig) -> Self {
        self.performance = config;
        self
    }

    /// Reject impossible settings
    pub fn validate(&self) -> Result<()> {
        self.learning_style.validate()?;
        self.performance.validate()
    }
}
