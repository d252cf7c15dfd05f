//! Hold-out split

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of one train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle `0..n_samples` with a seeded ChaCha8 generator and hold out
/// `ceil(n_samples * test_size)` rows, keeping at least one row per side.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if n_samples < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "need at least 2 rows to split, got {}",
            n_samples
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_samples as f64 * test_size).ceil() as usize).clamp(1, n_samples - 1);
    let train_indices = indices.split_off(n_test);

    Ok(TrainTestSplit {
        train_indices,
        test_indices: indices,
    })
}
