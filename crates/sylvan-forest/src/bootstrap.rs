//! Bootstrap (bagging) sampler.

use rand::Rng;
use sylvan_data::Dataset;

use crate::ForestError;

/// How rows are drawn into a bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Sampling {
    /// Uniform draws with replacement; the bag may repeat rows.
    #[default]
    WithReplacement,
    /// Distinct rows, kept in original order.
    WithoutReplacement,
}

/// One bootstrap draw: the bag, its out-of-bag complement, and the original
/// row indices of both.
#[derive(Debug, Clone)]
pub struct BootstrapSample {
    /// Drawn rows, duplicates kept as separate rows.
    pub bag: Dataset,
    /// Rows never drawn.
    pub oob: Dataset,
    /// Original index of each bag row, in draw order.
    pub bag_indices: Vec<usize>,
    /// Original index of each out-of-bag row, ascending.
    pub oob_indices: Vec<usize>,
}

/// Draw `n` rows from `dataset`.
///
/// With replacement every draw is uniform over `[0, N)`. Without replacement
/// `min(n, N)` distinct rows are chosen and returned in ascending order.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
/// | [`ForestError::EmptyBag`] | `n` is zero |
pub fn bootstrap<R: Rng>(
    dataset: &Dataset,
    n: usize,
    sampling: Sampling,
    rng: &mut R,
) -> Result<BootstrapSample, ForestError> {
    let n_rows = dataset.row_count();
    if n_rows == 0 {
        return Err(ForestError::EmptyDataset);
    }
    if n == 0 {
        return Err(ForestError::EmptyBag);
    }

    let bag_indices = draw_indices(n_rows, n, sampling, rng);
    let mut in_bag = vec![false; n_rows];
    for &i in &bag_indices {
        in_bag[i] = true;
    }
    let oob_indices: Vec<usize> = (0..n_rows).filter(|&i| !in_bag[i]).collect();

    Ok(BootstrapSample {
        bag: dataset.subset_rows(&bag_indices)?,
        oob: dataset.subset_rows(&oob_indices)?,
        bag_indices,
        oob_indices,
    })
}

fn draw_indices<R: Rng>(n_rows: usize, n: usize, sampling: Sampling, rng: &mut R) -> Vec<usize> {
    match sampling {
        Sampling::WithReplacement => (0..n).map(|_| rng.gen_range(0..n_rows)).collect(),
        Sampling::WithoutReplacement => {
            let mut picked = rand::seq::index::sample(rng, n_rows, n.min(n_rows)).into_vec();
            picked.sort_unstable();
            picked
        }
    }
}
