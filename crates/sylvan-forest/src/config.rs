//! Configuration builder for Random Forest training.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sylvan_data::Dataset;
use tracing::warn;

use crate::bootstrap::Sampling;
use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::sink::{CsvStatsWriter, NullSink};

/// Default number of trees.
pub const DEFAULT_N_TREE: usize = 100;

/// Default bag size as a percentage of the training rows.
pub const DEFAULT_PERCENT_BOOT: usize = 66;

/// Strategy for the number of attributes searched at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum RandomFeatures {
    /// `round(sqrt(n_attributes))`, at least 1.
    #[default]
    Sqrt,
    /// Every attribute (plain bagging).
    All,
    /// A fixed count in `1..=n_attributes`.
    Fixed(usize),
}

impl RandomFeatures {
    /// Resolve to a concrete count for `n_attributes` attributes.
    ///
    /// `Fixed(0)` and `Fixed(n)` with `n > n_attributes` fall back to
    /// [`Sqrt`](Self::Sqrt) with a warning.
    #[must_use]
    pub fn resolve(self, n_attributes: usize) -> usize {
        let sqrt = ((n_attributes as f64).sqrt().round() as usize).max(1);
        match self {
            RandomFeatures::Sqrt => sqrt,
            RandomFeatures::All => n_attributes.max(1),
            RandomFeatures::Fixed(n) if n == 0 || n > n_attributes => {
                warn!(
                    requested = n,
                    n_attributes,
                    fallback = sqrt,
                    "random feature count out of range, using sqrt"
                );
                sqrt
            }
            RandomFeatures::Fixed(n) => n,
        }
    }
}

/// Resolve a tree count, replacing zero with [`DEFAULT_N_TREE`].
pub(crate) fn resolve_n_tree(n_tree: usize) -> usize {
    if n_tree == 0 {
        warn!(fallback = DEFAULT_N_TREE, "tree count is zero, using default");
        DEFAULT_N_TREE
    } else {
        n_tree
    }
}

/// Bag size for `n_rows` rows at `percent_boot` percent, at least 1.
///
/// A percentage of zero or above 100 is replaced by [`DEFAULT_PERCENT_BOOT`].
pub(crate) fn resolve_n_subsample(n_rows: usize, percent_boot: usize) -> usize {
    let percent = if percent_boot == 0 || percent_boot > 100 {
        warn!(
            percent_boot,
            fallback = DEFAULT_PERCENT_BOOT,
            "bootstrap percentage out of range, using default"
        );
        DEFAULT_PERCENT_BOOT
    } else {
        percent_boot
    };
    (n_rows * percent / 100).max(1)
}

/// Configuration for Random Forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
/// Out-of-range values are corrected with a warning when the forest is
/// initialized, never rejected.
///
/// # Defaults
///
/// | Parameter         | Default           |
/// |-------------------|-------------------|
/// | `n_tree`          | 100               |
/// | `random_features` | `Sqrt`            |
/// | `percent_boot`    | 66                |
/// | `sampling`        | `WithReplacement` |
/// | `run_oob`         | `true`            |
/// | `seed`            | 42                |
/// | `stats_path`      | `None`            |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) n_tree: usize,
    pub(crate) random_features: RandomFeatures,
    pub(crate) percent_boot: usize,
    pub(crate) sampling: Sampling,
    pub(crate) run_oob: bool,
    pub(crate) seed: u64,
    pub(crate) stats_path: Option<PathBuf>,
}

impl ForestConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_tree: DEFAULT_N_TREE,
            random_features: RandomFeatures::Sqrt,
            percent_boot: DEFAULT_PERCENT_BOOT,
            sampling: Sampling::WithReplacement,
            run_oob: true,
            seed: 42,
            stats_path: None,
        }
    }

    // --- Setters ---

    /// Set the number of trees.
    #[must_use]
    pub fn with_n_tree(mut self, n_tree: usize) -> Self {
        self.n_tree = n_tree;
        self
    }

    /// Set the per-split attribute sampling strategy.
    #[must_use]
    pub fn with_random_features(mut self, random_features: RandomFeatures) -> Self {
        self.random_features = random_features;
        self
    }

    /// Set the bag size as a percentage of the training rows.
    #[must_use]
    pub fn with_percent_boot(mut self, percent_boot: usize) -> Self {
        self.percent_boot = percent_boot;
        self
    }

    /// Set the bootstrap sampling mode.
    #[must_use]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Enable or disable the per-tree out-of-bag pass.
    #[must_use]
    pub fn with_run_oob(mut self, run_oob: bool) -> Self {
        self.run_oob = run_oob;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Write one statistics row per tree, plus a totals row, to `path`.
    #[must_use]
    pub fn with_stats_path(mut self, path: Option<PathBuf>) -> Self {
        self.stats_path = path;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_tree(&self) -> usize {
        self.n_tree
    }

    /// Return the per-split attribute sampling strategy.
    #[must_use]
    pub fn random_features(&self) -> RandomFeatures {
        self.random_features
    }

    /// Return the bag size percentage.
    #[must_use]
    pub fn percent_boot(&self) -> usize {
        self.percent_boot
    }

    /// Return the bootstrap sampling mode.
    #[must_use]
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Return whether the out-of-bag pass runs.
    #[must_use]
    pub fn run_oob(&self) -> bool {
        self.run_oob
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the statistics file path, if set.
    #[must_use]
    pub fn stats_path(&self) -> Option<&Path> {
        self.stats_path.as_deref()
    }

    /// Train a Random Forest with a generator seeded from [`seed`](Self::seed).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::NoAttributes`] | `dataset` has only the class column |
    /// | [`ForestError::StatsWrite`] | the statistics file cannot be written |
    pub fn fit(&self, dataset: &Dataset) -> Result<RandomForest, ForestError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut forest = RandomForest::initialize(self, dataset)?;
        match &self.stats_path {
            Some(path) => {
                let mut sink = CsvStatsWriter::create(path)?;
                forest.build(dataset, &mut rng, &mut sink)?;
            }
            None => forest.build(dataset, &mut rng, &mut NullSink)?,
        }
        Ok(forest)
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self::new()
    }
}
