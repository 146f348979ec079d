//! Classification evaluation metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics for a held-out evaluation.
///
/// Precision, recall and F1 are support-weighted averages over the classes
/// present in the true labels; a class with no predicted members scores 0
/// precision rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Accuracy
    pub accuracy: f64,
    /// Weighted precision
    pub precision: f64,
    /// Weighted recall
    pub recall: f64,
    /// Weighted F1 score
    pub f1_score: f64,
    /// Number of evaluated samples
    pub support: usize,
    /// `confusion_matrix[true][predicted]`
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationMetrics {
    /// Metrics for an empty evaluation set
    pub fn empty(n_classes: usize) -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            support: 0,
            confusion_matrix: vec![vec![0; n_classes]; n_classes],
        }
    }

    /// Compute classification metrics from class indices
    pub fn compute(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut metrics = Self::empty(n_classes);
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return metrics;
        }
        metrics.support = n;

        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                metrics.confusion_matrix[t][p] += 1;
            }
        }

        let cm = &metrics.confusion_matrix;
        let correct: usize = (0..n_classes).map(|c| cm[c][c]).sum();
        metrics.accuracy = correct as f64 / n as f64;

        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut f1 = 0.0;
        for c in 0..n_classes {
            let support: usize = cm[c].iter().sum();
            if support == 0 {
                continue;
            }
            let tp = cm[c][c] as f64;
            let predicted: usize = (0..n_classes).map(|t| cm[t][c]).sum();

            let p = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
            let r = tp / support as f64;
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            let w = support as f64 / n as f64;
            precision += w * p;
            recall += w * r;
            f1 += w * f;
        }

        metrics.precision = precision;
        metrics.recall = recall;
        metrics.f1_score = f1;
        metrics
    }

    /// Headline metrics keyed by name
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("accuracy".to_string(), self.accuracy);
        map.insert("precision".to_string(), self.precision);
        map.insert("recall".to_string(), self.recall);
        map.insert("f1_score".to_string(), self.f1_score);
        map
    }
}
