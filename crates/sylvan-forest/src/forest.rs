//! Random Forest training with per-tree out-of-bag evaluation.

use rand::Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use sylvan_data::{first_max, ColumnKind, Dataset};
use tracing::{debug, info, instrument, warn};

use crate::bootstrap::{bootstrap, BootstrapSample, Sampling};
use crate::config::{resolve_n_subsample, resolve_n_tree, ForestConfig};
use crate::confusion::ConfusionMatrix;
use crate::error::ForestError;
use crate::sink::StatsSink;
use crate::stats::{Stat, StatTimer, TrainingStats};
use crate::tree::{check_layout, map_actual, DecisionTree, DecisionTreeConfig};

/// Predictions for a set of rows, with the matrix against their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Row id of each prediction, in dataset row order.
    pub row_ids: Vec<usize>,
    /// Predicted class indices.
    pub predictions: Vec<usize>,
    /// Actual class indices.
    pub actual: Vec<usize>,
    /// Actual against predicted.
    pub matrix: ConfusionMatrix,
}

impl Classification {
    /// Predicted labels as strings.
    #[must_use]
    pub fn predicted_labels(&self) -> Vec<&str> {
        let space = self.matrix.value_space();
        self.predictions
            .iter()
            .map(|&p| space.get(p).map_or("", String::as_str))
            .collect()
    }
}

/// Outcome of growing one tree.
#[derive(Debug, Clone)]
pub struct TreeReport {
    /// Statistics row recorded for the tree.
    pub stat: Stat,
    /// Out-of-bag pass, when enabled and the bag left rows out.
    pub oob: Option<Classification>,
}

/// A Random Forest ensemble.
///
/// Trees are appended one at a time by [`grow_tree`](Self::grow_tree), each
/// with the row ids of its bag, and never removed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) bag_indices: Vec<Vec<usize>>,
    /// Sorted distinct bag ids per tree.
    pub(crate) bag_members: Vec<Vec<usize>>,
    pub(crate) class_values: Vec<String>,
    pub(crate) class_index: usize,
    pub(crate) column_names: Vec<String>,
    pub(crate) column_kinds: Vec<ColumnKind>,
    pub(crate) n_tree: usize,
    pub(crate) n_random_feature: usize,
    pub(crate) n_subsample: usize,
    pub(crate) sampling: Sampling,
    pub(crate) run_oob: bool,
    pub(crate) stats: TrainingStats,
}

impl RandomForest {
    /// Create an empty forest for `dataset`, resolving every parameter.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::NoAttributes`] | `dataset` has only the class column |
    pub fn initialize(config: &ForestConfig, dataset: &Dataset) -> Result<Self, ForestError> {
        if dataset.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        if dataset.column_count() < 2 {
            return Err(ForestError::NoAttributes);
        }
        let n_attributes = dataset.column_count() - 1;
        let n_tree = resolve_n_tree(config.n_tree);
        let n_random_feature = config.random_features.resolve(n_attributes);
        let n_subsample = resolve_n_subsample(dataset.row_count(), config.percent_boot);

        info!(
            n_tree,
            n_rows = dataset.row_count(),
            n_attributes,
            n_random_feature,
            n_subsample,
            "random forest initialized"
        );

        Ok(Self {
            trees: Vec::with_capacity(n_tree),
            bag_indices: Vec::with_capacity(n_tree),
            bag_members: Vec::with_capacity(n_tree),
            class_values: dataset.class_value_space().to_vec(),
            class_index: dataset.class_column_index(),
            column_names: dataset.columns().iter().map(|c| c.name().to_string()).collect(),
            column_kinds: dataset.columns().iter().map(|c| c.kind()).collect(),
            n_tree,
            n_random_feature,
            n_subsample,
            sampling: config.sampling,
            run_oob: config.run_oob,
            stats: TrainingStats::new(dataset.class_value_space()),
        })
    }

    /// Grow trees until the forest holds `n_tree`, then write the totals row
    /// and close `sink`.
    ///
    /// Trees already grown stay in the forest when this returns an error.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::ColumnCountMismatch`] and friends | `dataset` differs from the one the forest was initialized for |
    /// | [`ForestError::StatsWrite`] | `sink` fails |
    #[instrument(skip_all, fields(n_tree = self.n_tree, n_rows = dataset.row_count()))]
    pub fn build<R: Rng>(
        &mut self,
        dataset: &Dataset,
        rng: &mut R,
        sink: &mut dyn StatsSink,
    ) -> Result<(), ForestError> {
        check_layout(dataset, self.class_index, &self.column_kinds)?;
        while self.trees.len() < self.n_tree {
            self.grow_tree(dataset, rng, sink)?;
        }
        self.finalize(sink)?;
        Ok(())
    }

    /// Draw a bag, build one tree on it, append it, and run the OOB pass.
    ///
    /// A tree-construction failure is retried with a fresh bootstrap draw
    /// until a tree is produced. A sink error is returned after the tree has
    /// been appended.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::StatsWrite`] | `sink` fails |
    #[instrument(skip_all, fields(tree = self.trees.len()))]
    pub fn grow_tree<R: Rng>(
        &mut self,
        dataset: &Dataset,
        rng: &mut R,
        sink: &mut dyn StatsSink,
    ) -> Result<TreeReport, ForestError> {
        let timer = StatTimer::start(self.trees.len());
        let tree_config =
            DecisionTreeConfig::new().with_n_random_feature(Some(self.n_random_feature));

        let (tree, sample) = loop {
            match self.draw_and_fit(&tree_config, dataset, rng) {
                Ok(pair) => break pair,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "tree construction failed, redrawing bootstrap sample");
                }
                Err(e) => return Err(e),
            }
        };

        let mut members = sample.bag_indices.clone();
        members.sort_unstable();
        members.dedup();
        self.bag_members.push(members);
        self.bag_indices.push(sample.bag_indices);
        self.trees.push(tree);

        let oob = if self.run_oob && !sample.oob_indices.is_empty() {
            Some(self.classify_set(&sample.oob, Some(sample.oob_indices.as_slice()))?)
        } else {
            None
        };

        let mut stat = timer.stop();
        if let Some(pass) = &oob {
            stat.set_counts(pass.matrix.counts());
            stat.oob_error = pass.matrix.error_rate();
        }
        let stat = self
            .stats
            .record(stat, oob.as_ref().map(|pass| &pass.matrix))?
            .clone();

        debug!(
            tree = stat.id,
            n_oob = oob.as_ref().map_or(0, |pass| pass.row_ids.len()),
            oob_error = stat.oob_error,
            oob_error_mean = stat.oob_error_mean,
            "tree grown"
        );

        sink.write_stat(&stat)?;
        Ok(TreeReport { stat, oob })
    }

    fn draw_and_fit<R: Rng>(
        &self,
        tree_config: &DecisionTreeConfig,
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<(DecisionTree, BootstrapSample), ForestError> {
        let sample = bootstrap(dataset, self.n_subsample, self.sampling, rng)?;
        let tree = tree_config.fit_with_rng(&sample.bag, rng)?;
        Ok((tree, sample))
    }

    /// Write the totals row and close `sink`, returning the totals row.
    ///
    /// # Errors
    ///
    /// [`ForestError::StatsWrite`] if `sink` fails.
    pub fn finalize(&self, sink: &mut dyn StatsSink) -> Result<Stat, ForestError> {
        let total = self.stats.total();
        sink.write_stat(&total)?;
        sink.finish()?;
        info!(
            n_trees = self.trees.len(),
            oob_error = total.oob_error,
            oob_error_mean = total.oob_error_mean,
            accuracy = total.accuracy,
            "random forest built"
        );
        Ok(total)
    }

    /// Per-class vote counts for `row` of `dataset`.
    ///
    /// With `row_id`, trees whose bag holds that id abstain. If every tree
    /// abstains, all trees vote.
    #[must_use]
    pub fn votes(&self, dataset: &Dataset, row: usize, row_id: Option<usize>) -> Vec<usize> {
        let mut votes = vec![0usize; self.class_values.len()];
        let mut n_votes = 0usize;
        for (tree, members) in self.trees.iter().zip(&self.bag_members) {
            if row_id.is_some_and(|id| members.binary_search(&id).is_ok()) {
                continue;
            }
            votes[tree.classify(dataset, row)] += 1;
            n_votes += 1;
        }
        if n_votes == 0 && row_id.is_some() {
            return self.votes(dataset, row, None);
        }
        votes
    }

    fn predict(&self, dataset: &Dataset, row: usize, row_id: Option<usize>) -> usize {
        first_max(&self.votes(dataset, row, row_id)).unwrap_or(0)
    }

    /// Classify every row of `dataset` by majority vote and tabulate against
    /// its class column.
    ///
    /// `row_ids[r]` is the training-set id of row `r`. When given, trees that
    /// were trained on that id do not vote for it. Vote ties go to the class
    /// that comes first in the value space.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyForest`] | the forest has no trees |
    /// | [`ForestError::RowIdCountMismatch`] | `row_ids` length differs from the row count |
    /// | [`ForestError::ColumnCountMismatch`] and friends | column layout differs from training |
    /// | [`ForestError::UnknownClassValue`] | a class label is outside the training value space |
    pub fn classify_set(
        &self,
        dataset: &Dataset,
        row_ids: Option<&[usize]>,
    ) -> Result<Classification, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        let n_rows = dataset.row_count();
        if let Some(ids) = row_ids {
            if ids.len() != n_rows {
                return Err(ForestError::RowIdCountMismatch {
                    n_rows,
                    n_ids: ids.len(),
                });
            }
        }
        check_layout(dataset, self.class_index, &self.column_kinds)?;
        let actual = map_actual(dataset, &self.class_values)?;

        let predictions: Vec<usize> = (0..n_rows)
            .map(|r| self.predict(dataset, r, row_ids.map(|ids| ids[r])))
            .collect();
        let matrix = ConfusionMatrix::from_labels(&actual, &predictions, &self.class_values)?;

        Ok(Classification {
            row_ids: row_ids.map_or_else(|| (0..n_rows).collect(), <[usize]>::to_vec),
            predictions,
            actual,
            matrix,
        })
    }

    /// Predicted class index of every row, classified in parallel.
    ///
    /// The class column is not read, so its labels may be unknown.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyForest`] | the forest has no trees |
    /// | [`ForestError::ColumnCountMismatch`] and friends | column layout differs from training |
    pub fn classify_rows(&self, dataset: &Dataset) -> Result<Vec<usize>, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        check_layout(dataset, self.class_index, &self.column_kinds)?;
        Ok((0..dataset.row_count())
            .into_par_iter()
            .map(|r| self.predict(dataset, r, None))
            .collect())
    }

    // --- Getters ---

    /// Return the trees in construction order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the bag row ids of every tree, in draw order.
    #[must_use]
    pub fn bag_indices(&self) -> &[Vec<usize>] {
        &self.bag_indices
    }

    /// Return the class value space.
    #[must_use]
    pub fn class_values(&self) -> &[String] {
        &self.class_values
    }

    /// Return the column names seen at training time.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Return the resolved tree count.
    #[must_use]
    pub fn n_tree(&self) -> usize {
        self.n_tree
    }

    /// Return the resolved number of attributes searched per split.
    #[must_use]
    pub fn n_random_feature(&self) -> usize {
        self.n_random_feature
    }

    /// Return the resolved bag size.
    #[must_use]
    pub fn n_subsample(&self) -> usize {
        self.n_subsample
    }

    /// Return the training statistics.
    #[must_use]
    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Return the totals row over every tree grown so far.
    #[must_use]
    pub fn stat_total(&self) -> Stat {
        self.stats.total()
    }

    /// Return the OOB error after each tree.
    #[must_use]
    pub fn oob_error_steps(&self) -> &[f64] {
        self.stats.oob_error_steps()
    }

    /// Return the sum of every per-tree OOB confusion matrix.
    #[must_use]
    pub fn oob_matrix(&self) -> &ConfusionMatrix {
        self.stats.oob_matrix()
    }
}
