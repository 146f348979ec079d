//! Learning-style detector
//!
//! Clusters behavioural feature vectors into four groups with k-means and
//! names each cluster after the learning style whose signal features its
//! members lean on most. The cluster→style mapping is derived after every
//! training run and stored in the bundle, since k-means gives no stable
//! cluster ordering across runs or seeds.

use crate::config::LearningStyleConfig;
use crate::error::{EdumindError, Result};
use crate::features::{FeatureSchema, Record, RecordExtractor, LEARNING_STYLE_SCHEMA};
use crate::preprocessing::PreprocessingStatistics;
use crate::store::{BundleCache, ModelBundle, ModelKind, ModelRegistry};
use crate::training::KMeans;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The four styles the detector distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    ReadingWriting,
    Kinesthetic,
}

impl LearningStyle {
    pub const ALL: [LearningStyle; 4] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::ReadingWriting,
        LearningStyle::Kinesthetic,
    ];

    /// Names in encoding order; also the categorical encoding of the
    /// performance predictor's `learning_style` field
    pub const NAMES: [&'static str; 4] = ["visual", "auditory", "reading_writing", "kinesthetic"];

    pub fn index(&self) -> usize {
        match self {
            LearningStyle::Visual => 0,
            LearningStyle::Auditory => 1,
            LearningStyle::ReadingWriting => 2,
            LearningStyle::Kinesthetic => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES[self.index()]
    }

    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL.iter().copied().find(|s| s.as_str() == normalized)
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal features per style, used to name clusters after training
pub const STYLE_SIGNALS: [(LearningStyle, &[&str]); 4] = [
    (LearningStyle::Visual, &["video_time", "visual_content_views"]),
    (LearningStyle::Auditory, &["audio_content_views", "chat_interactions"]),
    (LearningStyle::ReadingWriting, &["text_time", "text_content_views"]),
    (
        LearningStyle::Kinesthetic,
        &["interactive_time", "practice_exercises_completed", "quiz_attempts"],
    ),
];

const N_CLUSTERS: usize = 4;

/// Assign one style per cluster.
///
/// `cluster_z` holds, per cluster, the mean z-score of each feature over
/// its members. A cluster's affinity for a style is the mean over that
/// style's signal features; the one-to-one assignment with the highest
/// total affinity wins, the first in lexicographic order on ties.
pub fn derive_label_mapping(
    cluster_z: &Array2<f64>,
    schema: &FeatureSchema,
) -> Result<Vec<LearningStyle>> {
    if cluster_z.nrows() != N_CLUSTERS || cluster_z.ncols() != schema.len() {
        return Err(EdumindError::FeatureShapeMismatch {
            expected: schema.len(),
            actual: cluster_z.ncols(),
        });
    }

    let mut affinity = [[0.0f64; N_CLUSTERS]; N_CLUSTERS];
    for (s, (_, signals)) in STYLE_SIGNALS.iter().enumerate() {
        let columns = signals
            .iter()
            .map(|name| {
                schema.index_of(name).ok_or_else(|| {
                    EdumindError::ConfigError(format!("signal feature {} missing from schema", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        for c in 0..N_CLUSTERS {
            let sum: f64 = columns.iter().map(|&j| cluster_z[[c, j]]).sum();
            affinity[c][s] = sum / columns.len() as f64;
        }
    }

    let mut best: Option<([usize; N_CLUSTERS], f64)> = None;
    for perm in permutations() {
        let total: f64 = (0..N_CLUSTERS).map(|c| affinity[c][perm[c]]).sum();
        if best.map_or(true, |(_, b)| total > b) {
            best = Some((perm, total));
        }
    }

    let (perm, _) = best.ok_or_else(|| EdumindError::TrainingError("no label assignment".to_string()))?;
    Ok(perm.iter().map(|&s| STYLE_SIGNALS[s].0).collect())
}

/// All orderings of `0..4` in lexicographic order
fn permutations() -> Vec<[usize; N_CLUSTERS]> {
    fn extend(prefix: &mut Vec<usize>, out: &mut Vec<[usize; N_CLUSTERS]>) {
        if prefix.len() == N_CLUSTERS {
            let mut perm = [0; N_CLUSTERS];
            perm.copy_from_slice(prefix);
            out.push(perm);
            return;
        }
        for i in 0..N_CLUSTERS {
            if !prefix.contains(&i) {
                prefix.push(i);
                extend(prefix, out);
                prefix.pop();
            }
        }
    }

    let mut out = Vec::with_capacity(24);
    extend(&mut Vec::with_capacity(N_CLUSTERS), &mut out);
    out
}

/// Size and mean raw feature values of one training cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub label: LearningStyle,
    pub size: usize,
    pub feature_means: BTreeMap<String, f64>,
}

/// Fitted clustering model with its label mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStyleModel {
    pub kmeans: KMeans,
    /// `label_mapping[cluster]` is that cluster's style
    pub label_mapping: Vec<LearningStyle>,
    pub profiles: Vec<ClusterProfile>,
}

impl LearningStyleModel {
    pub fn label_for(&self, cluster: usize) -> Result<LearningStyle> {
        self.label_mapping.get(cluster).copied().ok_or_else(|| {
            EdumindError::TrainingError(format!("cluster {} has no label", cluster))
        })
    }
}

pub type LearningStyleBundle = ModelBundle<LearningStyleModel>;

/// Result of one learning-style prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStylePrediction {
    pub label: LearningStyle,
    pub cluster: usize,
    /// Inverse-distance share of the nearest centroid
    pub confidence: f64,
    /// Distance to the nearest centroid in model space
    pub distance: f64,
    /// Mean raw features of the assigned cluster
    pub cluster_characteristics: BTreeMap<String, f64>,
}

/// Learning-style pipeline: extraction, preprocessing, k-means, labelling
pub struct LearningStyleDetector {
    config: LearningStyleConfig,
    extractor: RecordExtractor,
    registry: Arc<ModelRegistry>,
    cache: BundleCache<LearningStyleModel>,
}

impl LearningStyleDetector {
    pub fn new(config: LearningStyleConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            config,
            extractor: RecordExtractor::new(&LEARNING_STYLE_SCHEMA),
            registry,
            cache: BundleCache::new(),
        }
    }

    pub fn config(&self) -> &LearningStyleConfig {
        &self.config
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        self.extractor.schema()
    }

    /// Fit a new bundle without publishing it
    pub fn fit(&self, records: &[Record]) -> Result<LearningStyleBundle> {
        if records.is_empty() {
            return Err(EdumindError::EmptyTrainingSet);
        }
        if records.len() < N_CLUSTERS {
            return Err(EdumindError::InsufficientData {
                required: N_CLUSTERS,
                actual: records.len(),
            });
        }

        let x = self.extractor.extract_batch(records)?;
        let statistics =
            PreprocessingStatistics::fit(&x, self.config.n_components, self.config.random_state)?;
        let embedded = statistics.transform(&x)?;
        let z = statistics.scale(&x)?;

        let mut kmeans = KMeans::new(N_CLUSTERS)
            .with_max_iter(self.config.max_iter)
            .with_n_init(self.config.n_init)
            .with_random_state(self.config.random_state);
        kmeans.fit(&embedded)?;

        let labels = kmeans
            .labels()
            .ok_or_else(|| EdumindError::TrainingError("k-means produced no labels".to_string()))?
            .to_vec();

        let cluster_z = cluster_means(&z, &labels);
        let cluster_raw = cluster_means(&x, &labels);
        let label_mapping = derive_label_mapping(&cluster_z, self.schema())?;

        let names = self.schema().names();
        let profiles = (0..N_CLUSTERS)
            .map(|c| ClusterProfile {
                cluster: c,
                label: label_mapping[c],
                size: labels.iter().filter(|&&l| l == c).count(),
                feature_means: names
                    .iter()
                    .cloned()
                    .zip(cluster_raw.row(c).iter().copied())
                    .collect(),
            })
            .collect::<Vec<_>>();

        let mut metrics = BTreeMap::new();
        metrics.insert("inertia".to_string(), kmeans.inertia().unwrap_or(0.0));
        metrics.insert("n_iter".to_string(), kmeans.n_iter() as f64);
        metrics.insert("n_samples".to_string(), records.len() as f64);

        for profile in &profiles {
            debug!(cluster = profile.cluster, label = %profile.label, size = profile.size, "Cluster labelled");
        }

        let model = LearningStyleModel {
            kmeans,
            label_mapping,
            profiles,
        };
        Ok(
            ModelBundle::new(ModelKind::LearningStyle, self.schema(), statistics, model)
                .with_metrics(metrics),
        )
    }

    /// Fit, publish as a new version and swap it into the cache
    pub fn train(&self, records: &[Record]) -> Result<Arc<LearningStyleBundle>> {
        let mut bundle = match self.fit(records) {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(error = %e, n_records = records.len(), "Learning-style training failed");
                return Err(e);
            }
        };

        let metric = |name: &str| bundle.header.metrics.get(name).copied().unwrap_or(0.0);
        let (inertia, n_iter) = (metric("inertia"), metric("n_iter"));

        let version = match self.registry.publish(&mut bundle) {
            Ok(version) => version,
            Err(e) => {
                error!(
                    error = %e,
                    inertia,
                    n_iter,
                    n_samples = records.len(),
                    "Learning-style model trained but could not be published"
                );
                return Err(e);
            }
        };

        info!(
            version,
            n_samples = records.len(),
            inertia,
            "Learning-style model trained"
        );

        let bundle = Arc::new(bundle);
        self.cache.swap_if_newer(Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Active bundle, loaded from the registry on first use
    pub fn bundle(&self) -> Result<Arc<LearningStyleBundle>> {
        let bundle = self
            .cache
            .get_or_try_load(|| self.registry.load_active(ModelKind::LearningStyle))?;
        bundle.check_schema(self.schema())?;
        Ok(bundle)
    }

    /// Drop the cached bundle and load the registry's active version
    pub fn reload(&self) -> Result<Arc<LearningStyleBundle>> {
        self.cache.clear();
        self.bundle()
    }

    /// Roll the registry back and serve the restored version
    pub fn rollback(&self, version: Option<u64>) -> Result<u64> {
        let restored = self.registry.rollback(ModelKind::LearningStyle, version)?;
        self.reload()?;
        Ok(restored)
    }

    pub fn predict(&self, record: &Record) -> Result<LearningStylePrediction> {
        let bundle = self.bundle()?;
        self.predict_with(&bundle, record)
    }

    /// Predict against an explicit bundle
    pub fn predict_with(
        &self,
        bundle: &LearningStyleBundle,
        record: &Record,
    ) -> Result<LearningStylePrediction> {
        let vector = self.extractor.extract(record)?;
        let embedded = bundle.statistics.transform_vector(&vector)?;

        let model = &bundle.model;
        let distances = model.kmeans.distances(&embedded.view())?;
        let (cluster, _) = model.kmeans.nearest(&embedded.view())?;
        let distance = distances[cluster];
        let label = model.label_for(cluster)?;

        let cluster_characteristics = model
            .profiles
            .get(cluster)
            .map(|p| p.feature_means.clone())
            .unwrap_or_default();

        debug!(cluster, label = %label, distance, "Learning style predicted");

        Ok(LearningStylePrediction {
            label,
            cluster,
            confidence: inverse_distance_share(&distances, cluster),
            distance,
            cluster_characteristics,
        })
    }

    /// Profile of one cluster of the active model
    pub fn cluster_characteristics(&self, cluster: usize) -> Result<ClusterProfile> {
        let bundle = self.bundle()?;
        bundle.model.profiles.get(cluster).cloned().ok_or_else(|| {
            EdumindError::DataError(format!(
                "cluster {} out of range (model has {})",
                cluster,
                bundle.model.profiles.len()
            ))
        })
    }
}

/// Per-cluster column means of `x`; empty clusters stay at zero
fn cluster_means(x: &Array2<f64>, labels: &[usize]) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros((N_CLUSTERS, x.ncols()));
    let mut counts = [0usize; N_CLUSTERS];
    for (row, &label) in x.axis_iter(Axis(0)).zip(labels.iter()) {
        if label < N_CLUSTERS {
            let mut target = sums.row_mut(label);
            target += &row;
            counts[label] += 1;
        }
    }
    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mut target = sums.row_mut(c);
            target /= count as f64;
        }
    }
    sums
}

fn inverse_distance_share(distances: &[f64], chosen: usize) -> f64 {
    const EPS: f64 = 1e-9;
    let weights: Vec<f64> = distances.iter().map(|d| 1.0 / (d + EPS)).collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        (weights[chosen] / total).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeSet;

    #[test]
    fn test_style_names_round_trip() {
        for style in LearningStyle::ALL {
            assert_eq!(LearningStyle::parse(style.as_str()), Some(style));
        }
        assert_eq!(LearningStyle::parse("Reading Writing"), Some(LearningStyle::ReadingWriting));
        assert_eq!(LearningStyle::parse("tactile"), None);
    }

    #[test]
    fn test_style_signals_cover_every_style_once() {
        let styles: BTreeSet<LearningStyle> = STYLE_SIGNALS.iter().map(|(s, _)| *s).collect();
        assert_eq!(styles.len(), 4);
        assert_eq!(styles, LearningStyle::ALL.iter().copied().collect());
        for (_, signals) in STYLE_SIGNALS {
            assert!(!signals.is_empty());
            for name in signals {
                assert!(LEARNING_STYLE_SCHEMA.index_of(name).is_some(), "{}", name);
            }
        }
    }

    #[test]
    fn test_permutations_are_lexicographic() {
        let perms = permutations();
        assert_eq!(perms.len(), 24);
        assert_eq!(perms[0], [0, 1, 2, 3]);
        assert_eq!(perms[23], [3, 2, 1, 0]);
        assert!(perms.windows(2).all(|w| w[0] < w[1]));
    }

    fn profile_with(signal: &[&str]) -> Vec<f64> {
        LEARNING_STYLE_SCHEMA
            .names()
            .iter()
            .map(|n| if signal.contains(&n.as_str()) { 2.0 } else { -0.5 })
            .collect()
    }

    #[test]
    fn test_mapping_follows_signals() {
        // Cluster order deliberately scrambled relative to style order
        let rows = [
            profile_with(&["text_time", "text_content_views"]),
            profile_with(&["interactive_time", "practice_exercises_completed", "quiz_attempts"]),
            profile_with(&["video_time", "visual_content_views"]),
            profile_with(&["audio_content_views", "chat_interactions"]),
        ];
        let flat: Vec<f64> = rows.concat();
        let z = Array2::from_shape_vec((4, 10), flat).unwrap();

        let mapping = derive_label_mapping(&z, &LEARNING_STYLE_SCHEMA).unwrap();
        assert_eq!(
            mapping,
            vec![
                LearningStyle::ReadingWriting,
                LearningStyle::Kinesthetic,
                LearningStyle::Visual,
                LearningStyle::Auditory,
            ]
        );
    }

    #[test]
    fn test_mapping_is_exhaustive_and_tie_breaks_first() {
        let z = Array2::zeros((4, 10));
        let mapping = derive_label_mapping(&z, &LEARNING_STYLE_SCHEMA).unwrap();
        assert_eq!(mapping, LearningStyle::ALL.to_vec());
    }

    #[test]
    fn test_mapping_rejects_wrong_shape() {
        let z = Array2::zeros((3, 10));
        assert!(derive_label_mapping(&z, &LEARNING_STYLE_SCHEMA).is_err());
    }

    #[test]
    fn test_cluster_means_skip_empty() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [10.0, 10.0]];
        let means = cluster_means(&x, &[0, 0, 2]);
        assert_eq!(means.row(0).to_vec(), vec![2.0, 3.0]);
        assert_eq!(means.row(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(means.row(2).to_vec(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_inverse_distance_share() {
        let conf = inverse_distance_share(&[1.0, 1.0, 2.0, 4.0], 0);
        assert!(conf > 0.25 && conf < 0.5);
        assert!((inverse_distance_share(&[0.0, 5.0, 5.0, 5.0], 0) - 1.0).abs() < 1e-6);
    }
}
