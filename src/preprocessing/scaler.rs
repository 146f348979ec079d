//! Standard (z-score) scaling

use crate::error::{EdumindError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature centring and scaling learned from a training batch.
///
/// Immutable once fitted: `transform` never looks at the data it is given
/// beyond applying `(x - center) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature mean
    center: Array1<f64>,
    /// Per-feature population standard deviation (1.0 where degenerate)
    scale: Array1<f64>,
    /// Indices of zero-variance features whose scale was substituted
    degenerate: Vec<usize>,
}

impl StandardScaler {
    /// Fit on an `n_samples x n_features` batch
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(EdumindError::EmptyTrainingSet);
        }

        let center = x
            .mean_axis(Axis(0))
            .ok_or(EdumindError::EmptyTrainingSet)?;

        let mut degenerate = Vec::new();
        let scale: Array1<f64> = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(j, col)| {
                let mean = center[j];
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
                let std = var.sqrt();
                if std < 1e-12 {
                    degenerate.push(j);
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Ok(Self { center, scale, degenerate })
    }

    pub fn n_features(&self) -> usize {
        self.center.len()
    }

    pub fn center(&self) -> &Array1<f64> {
        &self.center
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Zero-variance feature indices seen at fit time
    pub fn degenerate_features(&self) -> &[usize] {
        &self.degenerate
    }

    /// Scale a batch
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok((x - &self.center) / &self.scale)
    }

    /// Scale a single vector
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((row - &self.center) / &self.scale)
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
