//! Cascaded Random Forest: a chain of small forests, each trained on the
//! rows the previous stages could not yet reject as negative.
//!
//! Value-space index 0 is the positive class. After every stage the rows that
//! stage's last out-of-bag pass classified as true negatives are dropped, so
//! later stages concentrate on the harder positives and false positives. A
//! row is classified negative as soon as one stage says so.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sylvan_data::Dataset;
use tracing::{debug, info, instrument};

use crate::config::{ForestConfig, RandomFeatures, DEFAULT_PERCENT_BOOT};
use crate::confusion::ConfusionMatrix;
use crate::error::ForestError;
use crate::forest::{Classification, RandomForest, TreeReport};
use crate::sink::{CsvStatsWriter, NullSink, StatsSink};
use crate::stats::TrainingStats;
use crate::tree::map_actual;

/// Configuration for a cascaded Random Forest.
///
/// # Defaults
///
/// | Parameter         | Default |
/// |-------------------|---------|
/// | `n_stage`         | 200     |
/// | `n_tree`          | 1       |
/// | `percent_boot`    | 66      |
/// | `random_features` | `Sqrt`  |
/// | `tp_rate`         | 0.9     |
/// | `tn_rate`         | 0.7     |
/// | `seed`            | 42      |
/// | `stats_path`      | `None`  |
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub(crate) n_stage: usize,
    pub(crate) n_tree: usize,
    pub(crate) percent_boot: usize,
    pub(crate) random_features: RandomFeatures,
    pub(crate) tp_rate: f64,
    pub(crate) tn_rate: f64,
    pub(crate) seed: u64,
    pub(crate) stats_path: Option<PathBuf>,
}

impl CascadeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_stage: 200,
            n_tree: 1,
            percent_boot: DEFAULT_PERCENT_BOOT,
            random_features: RandomFeatures::Sqrt,
            tp_rate: 0.9,
            tn_rate: 0.7,
            seed: 42,
            stats_path: None,
        }
    }

    // --- Setters ---

    /// Set the maximum number of stages.
    #[must_use]
    pub fn with_n_stage(mut self, n_stage: usize) -> Self {
        self.n_stage = n_stage;
        self
    }

    /// Set the maximum number of trees per stage.
    #[must_use]
    pub fn with_n_tree(mut self, n_tree: usize) -> Self {
        self.n_tree = n_tree;
        self
    }

    /// Set the bag size as a percentage of each stage's rows.
    #[must_use]
    pub fn with_percent_boot(mut self, percent_boot: usize) -> Self {
        self.percent_boot = percent_boot;
        self
    }

    /// Set the per-split attribute sampling strategy.
    #[must_use]
    pub fn with_random_features(mut self, random_features: RandomFeatures) -> Self {
        self.random_features = random_features;
        self
    }

    /// Set the OOB TP rate a stage must exceed to stop adding trees.
    #[must_use]
    pub fn with_tp_rate(mut self, tp_rate: f64) -> Self {
        self.tp_rate = tp_rate;
        self
    }

    /// Set the OOB TN rate a stage must exceed to stop adding trees.
    #[must_use]
    pub fn with_tn_rate(mut self, tn_rate: f64) -> Self {
        self.tn_rate = tn_rate;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Write one statistics row per stage, plus a totals row, to `path`.
    #[must_use]
    pub fn with_stats_path(mut self, path: Option<PathBuf>) -> Self {
        self.stats_path = path;
        self
    }

    // --- Getters ---

    /// Return the maximum number of stages.
    #[must_use]
    pub fn n_stage(&self) -> usize {
        self.n_stage
    }

    /// Return the maximum number of trees per stage.
    #[must_use]
    pub fn n_tree(&self) -> usize {
        self.n_tree
    }

    /// Return the bag size percentage.
    #[must_use]
    pub fn percent_boot(&self) -> usize {
        self.percent_boot
    }

    /// Return the per-split attribute sampling strategy.
    #[must_use]
    pub fn random_features(&self) -> RandomFeatures {
        self.random_features
    }

    /// Return the TP rate threshold.
    #[must_use]
    pub fn tp_rate(&self) -> f64 {
        self.tp_rate
    }

    /// Return the TN rate threshold.
    #[must_use]
    pub fn tn_rate(&self) -> f64 {
        self.tn_rate
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

    /// Train a cascade with a generator seeded from [`seed`](Self::seed).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::NoAttributes`] | `dataset` has only the class column |
    /// | [`ForestError::StatsWrite`] | the statistics file cannot be written |
    pub fn fit(&self, dataset: &Dataset) -> Result<CascadedForest, ForestError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        match &self.stats_path {
            Some(path) => {
                let mut sink = CsvStatsWriter::create(path)?;
                CascadedForest::build(self, dataset, &mut rng, &mut sink)
            }
            None => CascadedForest::build(self, dataset, &mut rng, &mut NullSink),
        }
    }

    fn stage_config(&self) -> ForestConfig {
        ForestConfig::new()
            .with_n_tree(self.n_tree)
            .with_percent_boot(self.percent_boot)
            .with_random_features(self.random_features)
            .with_seed(self.seed)
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One stage of a cascade.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    forest: RandomForest,
    weight: f64,
}

impl Stage {
    /// Return the stage forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Return `exp(F)` of the stage's last out-of-bag pass.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// A trained cascade of Random Forest stages.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CascadedForest {
    stages: Vec<Stage>,
    class_values: Vec<String>,
    stats: TrainingStats,
}

impl CascadedForest {
    /// Train stages until `n_stage` is reached or the working rows are empty
    /// or hold a single class.
    ///
    /// One statistics row per stage (the stage forest's totals, with the stage
    /// number as id) and a final totals row are written to `sink`.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::NoAttributes`] | `dataset` has only the class column |
    /// | [`ForestError::StatsWrite`] | `sink` fails |
    #[instrument(skip_all, fields(n_stage = config.n_stage, n_rows = dataset.row_count()))]
    pub fn build<R: Rng>(
        config: &CascadeConfig,
        dataset: &Dataset,
        rng: &mut R,
        sink: &mut dyn StatsSink,
    ) -> Result<Self, ForestError> {
        if dataset.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        if dataset.column_count() < 2 {
            return Err(ForestError::NoAttributes);
        }

        let forest_config = config.stage_config();
        let mut cascade = Self {
            stages: Vec::new(),
            class_values: dataset.class_value_space().to_vec(),
            stats: TrainingStats::new(dataset.class_value_space()),
        };
        let mut working = dataset.clone();

        for stage_id in 0..config.n_stage {
            if working.is_empty() || working.is_single_class() {
                info!(stage = stage_id, n_rows = working.row_count(), "cascade stopped early");
                break;
            }

            let mut forest = RandomForest::initialize(&forest_config, &working)?;
            let mut last: Option<TreeReport> = None;
            while forest.trees().len() < forest.n_tree() {
                let report = forest.grow_tree(&working, rng, &mut NullSink)?;
                let reached = report.stat.tp_rate > config.tp_rate
                    && report.stat.tn_rate > config.tn_rate;
                last = Some(report);
                if reached {
                    break;
                }
            }
            let f_measure = last.as_ref().map_or(0.0, |r| r.stat.f_measure);

            let mut row = forest.stat_total();
            row.id = stage_id;
            let row = cascade.stats.record(row, Some(forest.oob_matrix()))?.clone();
            sink.write_stat(&row)?;

            let true_negatives = last
                .and_then(|r| r.oob)
                .map(|pass| {
                    ConfusionMatrix::group_indices(&pass.row_ids, &pass.actual, &pass.predictions)
                        .tn
                })
                .unwrap_or_default();

            debug!(
                stage = stage_id,
                n_trees = forest.trees().len(),
                n_rows = working.row_count(),
                n_removed = true_negatives.len(),
                oob_error = row.oob_error,
                "stage trained"
            );

            cascade.stages.push(Stage {
                forest,
                weight: f_measure.exp(),
            });

            if !true_negatives.is_empty() {
                let mut drop = vec![false; working.row_count()];
                for &id in &true_negatives {
                    drop[id] = true;
                }
                let keep: Vec<usize> = (0..working.row_count()).filter(|&r| !drop[r]).collect();
                working = working.subset_rows(&keep)?;
            }
        }

        let total = cascade.stats.total();
        sink.write_stat(&total)?;
        sink.finish()?;
        info!(
            n_stages = cascade.stages.len(),
            oob_error = total.oob_error,
            "cascaded forest built"
        );

        Ok(cascade)
    }

    /// Classify every row of `dataset`.
    ///
    /// A row takes the first negative label any stage predicts for it, or the
    /// positive label if every stage predicts positive.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyForest`] | the cascade has no stages |
    /// | [`ForestError::ColumnCountMismatch`] and friends | column layout differs from training |
    /// | [`ForestError::UnknownClassValue`] | a class label is outside the training value space |
    pub fn classify_set(&self, dataset: &Dataset) -> Result<Classification, ForestError> {
        if self.stages.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        let mut predictions = vec![0usize; dataset.row_count()];
        let mut decided = vec![false; dataset.row_count()];
        for stage in &self.stages {
            let stage_predictions = stage.forest.classify_rows(dataset)?;
            for (r, &p) in stage_predictions.iter().enumerate() {
                if !decided[r] && p != 0 {
                    predictions[r] = p;
                    decided[r] = true;
                }
            }
        }
        let actual = map_actual(dataset, &self.class_values)?;
        let matrix = ConfusionMatrix::from_labels(&actual, &predictions, &self.class_values)?;
        Ok(Classification {
            row_ids: (0..dataset.row_count()).collect(),
            predictions,
            actual,
            matrix,
        })
    }

    /// Return the trained stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Return the class value space; index 0 is the positive class.
    #[must_use]
    pub fn class_values(&self) -> &[String] {
        &self.class_values
    }

    /// Return the per-stage statistics.
    #[must_use]
    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }
}
