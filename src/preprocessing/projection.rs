//! PCA projection
//!
//! Linear dimensionality reduction fitted on the scaled training batch.
//! Computes the top-k eigenvectors of the covariance matrix using power
//! iteration with deflation.

use crate::error::{EdumindError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 300;
const TOL: f64 = 1e-10;

/// Fitted principal-component projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Per-feature mean of the fitting batch
    mean: Array1<f64>,
    /// Principal axes: n_components x n_features
    components: Array2<f64>,
    /// Explained variance ratio per component
    explained_variance_ratio: Vec<f64>,
}

impl Projection {
    /// Fit the top `n_components` axes (capped at the feature count)
    pub fn fit(x: &Array2<f64>, n_components: usize, random_state: u64) -> Result<Self> {
        let n = x.nrows();
        let d = x.ncols();
        if n == 0 {
            return Err(EdumindError::EmptyTrainingSet);
        }
        if n_components == 0 || d == 0 {
            return Err(EdumindError::ConfigError(
                "projection needs at least one component and one feature".to_string(),
            ));
        }
        let k = n_components.min(d);

        let mean = x.mean_axis(Axis(0)).ok_or(EdumindError::EmptyTrainingSet)?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / ((n as f64) - 1.0).max(1.0);

        let (eigenvalues, components) = power_iteration(&cov, k, random_state);

        let total_variance: f64 = cov.diag().sum().max(1e-12);
        let explained_variance_ratio = eigenvalues
            .iter()
            .map(|&ev| (ev / total_variance).max(0.0))
            .collect();

        Ok(Self {
            mean,
            components,
            explained_variance_ratio,
        })
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Project a batch onto the principal axes
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok((x - &self.mean).dot(&self.components.t()))
    }

    /// Project a single vector
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(self.components.dot(&(row - &self.mean)))
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        if actual != self.n_features() {
            return Err(EdumindError::FeatureShapeMismatch {
                expected: self.n_features(),
                actual,
            });
        }
        Ok(())
    }
}

/// Power iteration with deflation. Components are sign-normalised so the
/// largest-magnitude loading is positive.
fn power_iteration(cov: &Array2<f64>, k: usize, random_state: u64) -> (Vec<f64>, Array2<f64>) {
    let d = cov.nrows();
    let mut rng = ChaCha8Rng::seed_from_u64(random_state);

    let mut work = cov.clone();
    let mut eigenvalues = Vec::with_capacity(k);
    let mut components = Array2::zeros((k, d));

    for c in 0..k {
        let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm = v.dot(&v).sqrt().max(1e-12);
        v /= norm;

        let mut eigenvalue = 0.0f64;
        for _ in 0..MAX_ITER {
            let w = work.dot(&v);
            let w_norm = w.dot(&w).sqrt();
            if w_norm < 1e-12 {
                // Remaining variance is exhausted
                eigenvalue = 0.0;
                break;
            }
            eigenvalue = v.dot(&w);
            let new_v = w / w_norm;
            let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();
            v = new_v;
            if diff < TOL {
                break;
            }
        }

        let pivot = v
            .iter()
            .copied()
            .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }

        let eigenvalue = eigenvalue.max(0.0);
        for i in 0..d {
            for j in 0..d {
                work[[i, j]] -= eigenvalue * v[i] * v[j];
            }
        }

        eigenvalues.push(eigenvalue);
        components.row_mut(c).assign(&v);
    }

    (eigenvalues, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_projection_basic() {
        // Perfectly linear data: one axis carries all variance
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let projection = Projection::fit(&x, 2, 42).unwrap();

        assert_eq!(projection.n_components(), 2);
        assert!(
            projection.explained_variance_ratio()[0] > 0.95,
            "First component should explain >95% variance, got {}",
            projection.explained_variance_ratio()[0]
        );
    }

    #[test]
    fn test_projection_two_clusters() {
        let x = array![
            [0.0, 0.0, 0.0],
            [0.1, 0.1, 0.0],
            [0.0, 0.1, 0.1],
            [10.0, 10.0, 10.0],
            [10.1, 10.0, 10.0],
            [10.0, 10.1, 10.0],
        ];
        let projection = Projection::fit(&x, 2, 42).unwrap();
        let embedded = projection.transform(&x).unwrap();
        assert_eq!(embedded.dim(), (6, 2));

        let mean_a = embedded.slice(ndarray::s![..3, 0]).sum() / 3.0;
        let mean_b = embedded.slice(ndarray::s![3.., 0]).sum() / 3.0;
        assert!((mean_a - mean_b).abs() > 1.0, "Clusters should be separated");
    }

    #[test]
    fn test_components_capped_at_feature_count() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let projection = Projection::fit(&x, 4, 42).unwrap();
        assert_eq!(projection.n_components(), 2);
    }

    #[test]
    fn test_row_and_batch_agree() {
        let x = array![[1.0, 0.0, 0.5], [0.0, 1.0, 0.3], [1.0, 1.0, 0.8], [0.5, 0.5, 0.4]];
        let projection = Projection::fit(&x, 2, 7).unwrap();
        let batch = projection.transform(&x).unwrap();
        for (i, row) in x.rows().into_iter().enumerate() {
            let single = projection.transform_row(&row).unwrap();
            for j in 0..2 {
                assert!((single[j] - batch[[i, j]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_explained_variance_bounded() {
        let x = array![
            [1.0, 0.0, 0.5],
            [0.0, 1.0, 0.3],
            [1.0, 1.0, 0.8],
            [0.5, 0.5, 0.4],
            [0.2, 0.8, 0.6],
            [0.9, 0.1, 0.2],
        ];
        let projection = Projection::fit(&x, 2, 42).unwrap();
        let total: f64 = projection.explained_variance_ratio().iter().sum();
        assert!(total > 0.0 && total <= 1.001, "sum={}", total);
    }
}
