//! Performance predictor
//!
//! Random-forest classifier over student progress features, separating
//! at-risk, on-track and excelling students. Trained with balanced class
//! weights and evaluated on a held-out partition before publishing.

use crate::config::PerformanceConfig;
use crate::error::{EdumindError, Result};
use crate::features::{FeatureSchema, Record, RecordExtractor, PERFORMANCE_SCHEMA};
use crate::preprocessing::PreprocessingStatistics;
use crate::store::{BundleCache, ModelBundle, ModelKind, ModelRegistry};
use crate::training::decision_tree::argmax;
use crate::training::{train_test_split, ClassificationMetrics, MaxFeatures, RandomForest};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Performance classes, in class-index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    AtRisk,
    OnTrack,
    Excelling,
}

impl PerformanceLevel {
    pub const ALL: [PerformanceLevel; 3] = [
        PerformanceLevel::AtRisk,
        PerformanceLevel::OnTrack,
        PerformanceLevel::Excelling,
    ];

    pub const NAMES: [&'static str; 3] = ["at_risk", "on_track", "excelling"];

    pub fn index(&self) -> usize {
        match self {
            PerformanceLevel::AtRisk => 0,
            PerformanceLevel::OnTrack => 1,
            PerformanceLevel::Excelling => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES[self.index()]
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Accepts the class names (case and spacing insensitive) or the
    /// integer codes 0, 1, 2
    pub fn parse(label: &str) -> Result<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        if let Ok(code) = normalized.parse::<usize>() {
            return Self::from_index(code)
                .ok_or_else(|| EdumindError::InvalidLabel(label.to_string()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == normalized)
            .ok_or_else(|| EdumindError::InvalidLabel(label.to_string()))
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const N_CLASSES: usize = PerformanceLevel::NAMES.len();

/// Fitted forest with its evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceModel {
    pub forest: RandomForest,
    /// Held-out evaluation
    pub metrics: ClassificationMetrics,
    /// Mean impurity decrease per feature, normalised
    pub feature_importances: BTreeMap<String, f64>,
    pub n_train: usize,
    pub n_test: usize,
}

pub type PerformanceBundle = ModelBundle<PerformanceModel>;

/// Result of one performance prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePrediction {
    pub label: PerformanceLevel,
    /// Probability of the predicted class
    pub confidence: f64,
    /// Probability of every class, keyed by name
    pub probabilities: BTreeMap<String, f64>,
}

/// Outcome of a published training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub version: u64,
    pub metrics: ClassificationMetrics,
    pub n_train: usize,
    pub n_test: usize,
}

/// Performance pipeline: extraction, scaling, forest, labelling
pub struct PerformancePredictor {
    config: PerformanceConfig,
    extractor: RecordExtractor,
    registry: Arc<ModelRegistry>,
    cache: BundleCache<PerformanceModel>,
}

impl PerformancePredictor {
    pub fn new(config: PerformanceConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            config,
            extractor: RecordExtractor::new(&PERFORMANCE_SCHEMA),
            registry,
            cache: BundleCache::new(),
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        self.extractor.schema()
    }

    /// Fit and evaluate a new bundle without publishing it
    pub fn fit<S: AsRef<str>>(&self, records: &[Record], labels: &[S]) -> Result<PerformanceBundle> {
        if records.len() != labels.len() {
            return Err(EdumindError::LabelMismatch {
                records: records.len(),
                labels: labels.len(),
            });
        }
        if records.is_empty() {
            return Err(EdumindError::EmptyTrainingSet);
        }

        let y = labels
            .iter()
            .map(|l| PerformanceLevel::parse(l.as_ref()).map(|level| level.index()))
            .collect::<Result<Vec<usize>>>()?;
        let x = self.extractor.extract_batch(records)?;

        let split = train_test_split(records.len(), self.config.test_ratio, self.config.random_state)?;
        if split.test.is_empty() {
            warn!(n_samples = records.len(), "Held-out partition is empty, metrics will be zero");
        }

        let x_train = x.select(Axis(0), &split.train);
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();

        let statistics = PreprocessingStatistics::fit(&x_train, None, self.config.random_state)?;

        let mut forest = RandomForest::new(self.config.n_estimators)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_max_features(MaxFeatures::Sqrt)
            .with_class_weight(self.config.class_weight)
            .with_random_state(self.config.random_state);
        forest.fit(&statistics.transform(&x_train)?, &y_train, N_CLASSES)?;

        let metrics = if split.test.is_empty() {
            ClassificationMetrics::empty(N_CLASSES)
        } else {
            let x_test = x.select(Axis(0), &split.test);
            let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();
            let predicted = forest.predict(&statistics.transform(&x_test)?)?;
            ClassificationMetrics::compute(&y_test, &predicted, N_CLASSES)
        };

        let feature_importances = match forest.feature_importances() {
            Some(imp) => self
                .schema()
                .names()
                .into_iter()
                .zip(imp.iter().copied())
                .collect(),
            None => BTreeMap::new(),
        };

        let header_metrics = metrics.to_map();
        let model = PerformanceModel {
            forest,
            metrics,
            feature_importances,
            n_train: split.train.len(),
            n_test: split.test.len(),
        };
        Ok(
            ModelBundle::new(ModelKind::Performance, self.schema(), statistics, model)
                .with_metrics(header_metrics),
        )
    }

    /// Fit, evaluate, publish as a new version and swap it into the cache
    pub fn train<S: AsRef<str>>(&self, records: &[Record], labels: &[S]) -> Result<TrainingReport> {
        let mut bundle = match self.fit(records, labels) {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(error = %e, n_records = records.len(), "Performance training failed");
                return Err(e);
            }
        };

        let metrics = bundle.model.metrics.clone();
        let version = match self.registry.publish(&mut bundle) {
            Ok(version) => version,
            Err(e) => {
                error!(
                    error = %e,
                    accuracy = metrics.accuracy,
                    precision = metrics.precision,
                    recall = metrics.recall,
                    f1_score = metrics.f1_score,
                    "Performance model trained but could not be published"
                );
                return Err(e);
            }
        };

        info!(
            version,
            n_train = bundle.model.n_train,
            n_test = bundle.model.n_test,
            accuracy = metrics.accuracy,
            f1_score = metrics.f1_score,
            "Performance model trained"
        );

        let report = TrainingReport {
            version,
            metrics,
            n_train: bundle.model.n_train,
            n_test: bundle.model.n_test,
        };
        self.cache.swap_if_newer(Arc::new(bundle));
        Ok(report)
    }

    /// Active bundle, loaded from the registry on first use
    pub fn bundle(&self) -> Result<Arc<PerformanceBundle>> {
        let bundle = self
            .cache
            .get_or_try_load(|| self.registry.load_active(ModelKind::Performance))?;
        bundle.check_schema(self.schema())?;
        Ok(bundle)
    }

    /// Drop the cached bundle and load the registry's active version
    pub fn reload(&self) -> Result<Arc<PerformanceBundle>> {
        self.cache.clear();
        self.bundle()
    }

    /// Roll the registry back and serve the restored version
    pub fn rollback(&self, version: Option<u64>) -> Result<u64> {
        let restored = self.registry.rollback(ModelKind::Performance, version)?;
        self.reload()?;
        Ok(restored)
    }

    pub fn predict(&self, record: &Record) -> Result<PerformancePrediction> {
        let bundle = self.bundle()?;
        self.predict_with(&bundle, record)
    }

    /// Predict against an explicit bundle
    pub fn predict_with(&self, bundle: &PerformanceBundle, record: &Record) -> Result<PerformancePrediction> {
        let vector = self.extractor.extract(record)?;
        let expected = bundle.model.forest.n_features();
        if vector.len() != expected {
            return Err(EdumindError::FeatureShapeMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let scaled = bundle.statistics.transform_vector(&vector)?;
        let proba = bundle.model.forest.predict_proba_row(&scaled.view())?;
        let proba = proba.to_vec();

        let index = argmax(&proba);
        let label = PerformanceLevel::from_index(index).ok_or_else(|| {
            EdumindError::TrainingError(format!("forest produced class {}", index))
        })?;

        let probabilities = PerformanceLevel::ALL
            .iter()
            .map(|l| (l.as_str().to_string(), proba.get(l.index()).copied().unwrap_or(0.0)))
            .collect();

        debug!(label = %label, confidence = proba[index], "Performance predicted");

        Ok(PerformancePrediction {
            label,
            confidence: proba[index],
            probabilities,
        })
    }

    /// Feature importances of the active model, most important first
    pub fn feature_importances(&self) -> Result<Vec<(String, f64)>> {
        let bundle = self.bundle()?;
        let mut ranked: Vec<(String, f64)> = bundle
            .model
            .feature_importances
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}
