//! Weighted classification tree
//!
//! CART-style tree over class indices `0..n_classes`. Samples carry weights
//! (bootstrap counts times class weights) and every leaf stores the weighted
//! class distribution it was fitted on, so probabilities come straight from
//! the leaves.

use crate::error::{EdumindError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the weighted class distribution
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Entropy
    Entropy,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled per split (`None` = all)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

/// Training view shared by the recursive builder
struct Samples<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    weight: &'a [f64],
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features sampled per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on class indices with per-sample weights. Zero-weight samples
    /// are ignored.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        sample_weight: &[f64],
        n_classes: usize,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(EdumindError::LabelMismatch {
                records: n_samples,
                labels: y.len(),
            });
        }
        if sample_weight.len() != n_samples {
            return Err(EdumindError::TrainingError(format!(
                "expected {} sample weights, got {}",
                n_samples,
                sample_weight.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(EdumindError::InvalidLabel(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let indices: Vec<usize> = (0..n_samples).filter(|&i| sample_weight[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(EdumindError::TrainingError(
                "no samples with positive weight".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes;

        let samples = Samples { x, y, weight: sample_weight };
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; self.n_features];

        self.root = Some(self.build_tree(&samples, &indices, 0, &mut rng, &mut importances));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        samples: &Samples<'_>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_weights(samples, indices);
        let total: f64 = counts.iter().sum();
        let impurity = self.impurity(&counts, total);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return Self::leaf(&counts, total, n_samples);
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(samples, indices, &features, impurity, total) {
            Some(best) => best,
            None => return Self::leaf(&counts, total, n_samples),
        };
        let (feature_idx, threshold, gain) = best;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| samples.x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += total * gain;

        let left = Box::new(self.build_tree(samples, &left_indices, depth + 1, rng, importances));
        let right = Box::new(self.build_tree(samples, &right_indices, depth + 1, rng, importances));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn leaf(counts: &[f64], total: f64, n_samples: usize) -> TreeNode {
        let distribution = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            vec![1.0 / counts.len() as f64; counts.len()]
        };
        TreeNode::Leaf { distribution, n_samples }
    }

    fn class_weights(&self, samples: &Samples<'_>, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[samples.y[i]] += samples.weight[i];
        }
        counts
    }

    /// Sorted feature subset considered at one split
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m < self.n_features => {
                let mut chosen = rand::seq::index::sample(rng, self.n_features, m.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best (feature, threshold, gain) over the candidate features.
    /// Each feature is scanned once in sorted order with running class
    /// weights; ties keep the lower feature index.
    fn find_best_split(
        &self,
        samples: &Samples<'_>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        total: f64,
    ) -> Option<(usize, f64, f64)> {
        let parent_counts = self.class_weights(samples, indices);
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let x = samples.x;
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = vec![0.0; self.n_classes];
                let mut left_weight = 0.0;
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len().saturating_sub(1) {
                    let i = order[pos];
                    left[samples.y[i]] += samples.weight[i];
                    left_weight += samples.weight[i];

                    let current = x[[i, feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if current >= next {
                        continue;
                    }

                    let n_left = pos + 1;
                    let n_right = order.len() - n_left;
                    if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                        continue;
                    }

                    let right: Vec<f64> = parent_counts
                        .iter()
                        .zip(left.iter())
                        .map(|(t, l)| (t - l).max(0.0))
                        .collect();
                    let right_weight = (total - left_weight).max(0.0);

                    let weighted = (left_weight * self.impurity(&left, left_weight)
                        + right_weight * self.impurity(&right, right_weight))
                        / total;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        let mut threshold = (current + next) / 2.0;
                        if threshold >= next {
                            threshold = current;
                        }
                        best = Some((gain, threshold));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(best) if best.2 >= cand.2 => Some(best),
                _ => Some(cand),
            })
    }

    fn impurity(&self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self.criterion {
            Criterion::Gini => {
                1.0 - counts.iter().map(|&c| (c / total).powi(2)).sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .map(|&c| {
                    let p = c / total;
                    if p > 0.0 { p * p.ln() } else { 0.0 }
                })
                .sum::<f64>(),
        }
    }

    /// Class distribution of the leaf `row` falls into
    pub fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<&[f64]> {
        let root = self.root.as_ref().ok_or(EdumindError::ModelNotTrained)?;
        if row.len() != self.n_features {
            return Err(EdumindError::FeatureShapeMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { distribution, .. } => return Ok(distribution),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Class probabilities for a batch (n_samples x n_classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let dist = self.predict_proba_row(&row)?;
            proba.row_mut(i).assign(&ArrayView1::from(dist));
        }
        Ok(proba)
    }

    /// Most probable class per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba_row(&row).map(argmax))
            .collect()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

/// Index of the largest entry; the lowest index wins ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
