//! Preprocessing statistics: the exact transform a model was trained with

use super::{Projection, StandardScaler};
use crate::error::{EdumindError, Result};
use crate::features::FeatureVector;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scaling (and optional projection) learned once at training time and
/// owned by exactly one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingStatistics {
    scaler: StandardScaler,
    projection: Option<Projection>,
}

impl PreprocessingStatistics {
    /// Fit scaling on `x`, then a projection to `n_components` on the
    /// scaled batch when requested
    pub fn fit(x: &Array2<f64>, n_components: Option<usize>, random_state: u64) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(EdumindError::EmptyTrainingSet);
        }

        let scaler = StandardScaler::fit(x)?;
        if !scaler.degenerate_features().is_empty() {
            warn!(
                features = ?scaler.degenerate_features(),
                "Zero-variance features, substituting unit scale"
            );
        }

        let projection = match n_components {
            Some(k) => {
                let scaled = scaler.transform(x)?;
                Some(Projection::fit(&scaled, k, random_state)?)
            }
            None => None,
        };

        Ok(Self { scaler, projection })
    }

    /// Width of the raw feature vectors this transform accepts
    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Width of the transformed vectors
    pub fn output_dim(&self) -> usize {
        self.projection
            .as_ref()
            .map_or(self.n_features(), Projection::n_components)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Apply the full transform to a batch
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scaled = self.scaler.transform(x)?;
        match &self.projection {
            Some(p) => p.transform(&scaled),
            None => Ok(scaled),
        }
    }

    /// Only the scaling step (z-scores in the original feature space)
    pub fn scale(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.scaler.transform(x)
    }

    /// Apply the full transform to one extracted vector
    pub fn transform_vector(&self, vector: &FeatureVector) -> Result<Array1<f64>> {
        if vector.len() != self.n_features() {
            return Err(EdumindError::FeatureShapeMismatch {
                expected: self.n_features(),
                actual: vector.len(),
            });
        }
        let raw = vector.to_array();
        let scaled = self.scaler.transform_row(&raw.view())?;
        match &self.projection {
            Some(p) => p.transform_row(&scaled.view()),
            None => Ok(scaled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn batch() -> Array2<f64> {
        array![
            [120.0, 10.0, 5.0],
            [10.0, 90.0, 5.0],
            [15.0, 12.0, 80.0],
            [100.0, 20.0, 10.0],
            [5.0, 100.0, 0.0],
        ]
    }

    #[test]
    fn test_fit_without_projection() {
        let stats = PreprocessingStatistics::fit(&batch(), None, 42).unwrap();
        assert_eq!(stats.n_features(), 3);
        assert_eq!(stats.output_dim(), 3);
        assert!(stats.projection().is_none());
    }

    #[test]
    fn test_fit_with_projection() {
        let stats = PreprocessingStatistics::fit(&batch(), Some(2), 42).unwrap();
        assert_eq!(stats.output_dim(), 2);
        assert_eq!(stats.transform(&batch()).unwrap().dim(), (5, 2));
    }

    #[test]
    fn test_transform_is_pure() {
        let stats = PreprocessingStatistics::fit(&batch(), Some(2), 42).unwrap();
        let v = FeatureVector::new(vec![60.0, 30.0, 12.0]);
        let a = stats.transform_vector(&v).unwrap();
        let b = stats.transform_vector(&v).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_vector_and_batch_agree() {
        let stats = PreprocessingStatistics::fit(&batch(), Some(2), 42).unwrap();
        let x = batch();
        let whole = stats.transform(&x).unwrap();
        let first = stats
            .transform_vector(&FeatureVector::new(x.row(0).to_vec()))
            .unwrap();
        for j in 0..2 {
            assert!((whole[[0, j]] - first[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let stats = PreprocessingStatistics::fit(&batch(), None, 42).unwrap();
        let v = FeatureVector::new(vec![1.0, 2.0]);
        assert!(matches!(
            stats.transform_vector(&v),
            Err(EdumindError::FeatureShapeMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_empty_batch() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            PreprocessingStatistics::fit(&x, Some(2), 42),
            Err(EdumindError::EmptyTrainingSet)
        ));
    }
}
