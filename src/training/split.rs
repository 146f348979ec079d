//! Deterministic train / held-out partitioning

use crate::error::{EdumindError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row indices of one train / held-out partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_samples` with `seed` and hold out `ceil(n * test_ratio)`
/// rows, always leaving at least one training row. A single sample yields
/// an empty held-out partition.
pub fn train_test_split(n_samples: usize, test_ratio: f64, seed: u64) -> Result<TrainTestSplit> {
    if n_samples == 0 {
        return Err(EdumindError::EmptyTrainingSet);
    }
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(EdumindError::ConfigError(format!(
            "test_ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_samples as f64 * test_ratio).ceil() as usize).min(n_samples - 1);
    let train = indices.split_off(n_test);

    Ok(TrainTestSplit { train, test: indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_deterministic() {
        assert_eq!(
            train_test_split(50, 0.2, 42).unwrap(),
            train_test_split(50, 0.2, 42).unwrap()
        );
    }

    #[test]
    fn test_single_sample_keeps_training_row() {
        let split = train_test_split(1, 0.2, 42).unwrap();
        assert_eq!(split.train, vec![0]);
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(matches!(
            train_test_split(10, 1.0, 42),
            Err(EdumindError::ConfigError(_))
        ));
    }
}
