//! K-Means clustering
//!
//! Unsupervised model: takes X only. `fit()` learns centroids by iterative
//! relocation, `predict()` assigns each row to its nearest centroid.

use crate::error::{EdumindError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// K-Means clustering with k-means++ initialization and restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    /// Iteration cap per run
    pub max_iter: usize,
    /// Number of independently seeded runs; lowest inertia wins
    pub n_init: usize,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters x n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster assignments of the fitting batch
    #[serde(skip)]
    labels: Option<Vec<usize>>,
    /// Sum of squared distances to nearest centroid
    inertia: Option<f64>,
    /// Iterations used by the winning run
    n_iter: usize,
}

struct Run {
    centroids: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(4)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            n_init: 10,
            random_state: 42,
            centroids: None,
            labels: None,
            inertia: None,
            n_iter: 0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            // Squared distance of every point to its nearest chosen centroid
            let dists: Vec<f64> = x
                .rows()
                .into_iter()
                .map(|row| {
                    (0..c)
                        .map(|j| euclidean_sq(&row, &centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = rng.gen_range(0..n_samples);
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            // Weighted random selection proportional to D^2
            let r = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r && d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    /// Fit the model (unsupervised, no y needed)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(EdumindError::EmptyTrainingSet);
        }
        if self.n_clusters == 0 {
            return Err(EdumindError::ConfigError("n_clusters must be at least 1".to_string()));
        }
        if n_samples < self.n_clusters {
            return Err(EdumindError::InsufficientData {
                required: self.n_clusters,
                actual: n_samples,
            });
        }

        let mut best: Option<Run> = None;
        for run in 0..self.n_init.max(1) {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(run as u64));
            let candidate = self.run_lloyd(x, &mut rng);
            if best.as_ref().map_or(true, |b| candidate.inertia < b.inertia) {
                best = Some(candidate);
            }
        }

        let best = best.ok_or_else(|| EdumindError::TrainingError("no k-means run completed".to_string()))?;
        self.centroids = Some(best.centroids);
        self.labels = Some(best.labels);
        self.inertia = Some(best.inertia);
        self.n_iter = best.n_iter;
        Ok(self)
    }

    /// One seeded run: assign, recompute means, repeat until no assignment
    /// changes or the iteration cap is hit
    fn run_lloyd(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> Run {
        let k = self.n_clusters;
        let mut centroids = Self::kmeans_pp_init(x, k, rng);
        let mut labels = assign_all(x, &centroids);
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            centroids = update_centroids(x, &labels, &centroids);

            let new_labels = assign_all(x, &centroids);
            let changed = new_labels
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            labels = new_labels;

            if changed == 0 {
                break;
            }
        }

        let inertia = x
            .rows()
            .into_iter()
            .zip(labels.iter())
            .map(|(row, &c)| euclidean_sq(&row, &centroids.row(c)))
            .sum();

        Run { centroids, labels, inertia, n_iter }
    }

    /// Nearest centroid and its squared distance. Ties go to the lower index.
    pub fn nearest(&self, row: &ArrayView1<f64>) -> Result<(usize, f64)> {
        let centroids = self.centroids.as_ref().ok_or(EdumindError::ModelNotTrained)?;
        self.check_width(row.len())?;
        Ok(nearest_centroid(row, centroids))
    }

    /// Euclidean distance from `row` to every centroid
    pub fn distances(&self, row: &ArrayView1<f64>) -> Result<Vec<f64>> {
        let centroids = self.centroids.as_ref().ok_or(EdumindError::ModelNotTrained)?;
        self.check_width(row.len())?;
        Ok(centroids
            .rows()
            .into_iter()
            .map(|c| euclidean_sq(row, &c).sqrt())
            .collect())
    }

    /// Predict cluster indices for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or(EdumindError::ModelNotTrained)?;
        self.check_width(x.ncols())?;
        Ok(assign_all(x, centroids))
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        let expected = self.centroids.as_ref().map_or(0, |c| c.ncols());
        if actual != expected {
            return Err(EdumindError::FeatureShapeMismatch { expected, actual });
        }
        Ok(())
    }

    /// Get cluster centroids
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    /// Assignments of the fitting batch (not persisted)
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }
}

fn euclidean_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(row: &ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best_c = 0;
    let mut best_dist = f64::MAX;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = euclidean_sq(row, &centroid);
        // Strict comparison keeps the lower index on ties
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    (best_c, best_dist)
}

fn assign_all(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    (0..x.nrows())
        .into_par_iter()
        .map(|i| nearest_centroid(&x.row(i), centroids).0)
        .collect()
}

/// Recompute centroids as cluster means. An empty cluster takes the point
/// farthest from its current centroid.
fn update_centroids(x: &Array2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let k = previous.nrows();
    let mut centroids = Array2::zeros(previous.dim());
    let mut counts = vec![0usize; k];

    for (row, &c) in x.axis_iter(Axis(0)).zip(labels.iter()) {
        counts[c] += 1;
        let mut target = centroids.row_mut(c);
        target += &row;
    }

    let mut taken: Vec<usize> = Vec::new();
    for c in 0..k {
        if counts[c] > 0 {
            let mut target = centroids.row_mut(c);
            target /= counts[c] as f64;
            continue;
        }

        let farthest = x
            .rows()
            .into_iter()
            .zip(labels.iter())
            .enumerate()
            .filter(|(i, _)| !taken.contains(i))
            .map(|(i, (row, &l))| (i, euclidean_sq(&row, &previous.row(l))))
            .fold(None, |acc: Option<(usize, f64)>, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });

        match farthest {
            Some((i, _)) => {
                taken.push(i);
                centroids.row_mut(c).assign(&x.row(i));
            }
            None => centroids.row_mut(c).assign(&previous.row(c)),
        }
    }

    centroids
}
