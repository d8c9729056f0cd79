use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::model::Dataset;

/// Train/test partitioning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing, in `(0, 1)`.
    pub test_size: f64,
    /// Seed for the row shuffle.
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
        }
    }
}

/// Shuffle `0..n_rows` and cut it into `(train, test)` index lists.
///
/// `n_test = ceil(test_size * n_rows)` and the train set takes the rest, so
/// 1000 rows at 0.2 give 800/200.  Both sides must end up non-empty.
pub fn train_test_split(n_rows: usize, config: &SplitConfig) -> Result<(Vec<usize>, Vec<usize>)> {
    let test_size = config.test_size;
    if !(test_size > 0.0 && test_size < 1.0) {
        bail!("test_size must be in (0, 1), got {test_size}");
    }

    let n_test = (test_size * n_rows as f64).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        bail!(
            "With n_samples={n_rows} and test_size={test_size}, one of the resulting sets would be empty"
        );
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Split a dataset's rows into `(train, test)` datasets.
pub fn split_dataset(dataset: &Dataset, config: &SplitConfig) -> Result<(Dataset, Dataset)> {
    let (train_idx, test_idx) = train_test_split(dataset.len(), config)?;
    Ok((dataset.select(&train_idx), dataset.select(&test_idx)))
}
