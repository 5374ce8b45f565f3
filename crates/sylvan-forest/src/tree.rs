use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sylvan_data::{first_max, ColumnKind, Dataset, ValueRef};
use tracing::{debug, instrument};

use crate::{
    confusion::ConfusionMatrix,
    gini::{evaluate_continuous, evaluate_discrete, GainRecord},
    node::{FeatureIndex, Impurity, Node, NodeIndex, SplitRule},
    ForestError,
};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default                 |
/// |--------------------|-------------------------|
/// | `n_random_feature` | `None` (all attributes) |
/// | `seed`             | 42                      |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) n_random_feature: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_random_feature: None,
            seed: 42,
        }
    }

    /// Set how many attributes are sampled at each node.
    ///
    /// `None` or `Some(0)` searches every attribute. A value at or above the
    /// number of eligible attributes also searches every attribute.
    #[must_use]
    pub fn with_n_random_feature(mut self, n_random_feature: Option<usize>) -> Self {
        self.n_random_feature = n_random_feature;
        self
    }

    /// Set the random seed used by [`fit`](Self::fit).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the per-node attribute sample size, if set.
    #[must_use]
    pub fn n_random_feature(&self) -> Option<usize> {
        self.n_random_feature
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a tree on every row of `dataset` with a generator seeded from
    /// [`seed`](Self::seed).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `dataset` has zero rows |
    /// | [`ForestError::NoAttributes`] | `dataset` has only the class column |
    /// | [`ForestError::DegenerateSplit`] | a chosen split has a non-finite gain |
    pub fn fit(&self, dataset: &Dataset) -> Result<DecisionTree, ForestError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.fit_with_rng(dataset, &mut rng)
    }

    /// Train a tree on every row of `dataset`, drawing random attribute
    /// subsets from `rng`.
    ///
    /// # Errors
    ///
    /// Same as [`fit`](Self::fit).
    #[instrument(skip_all, fields(n_rows = dataset.row_count()))]
    pub fn fit_with_rng<R: Rng>(
        &self,
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<DecisionTree, ForestError> {
        if dataset.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        if dataset.column_count() < 2 {
            return Err(ForestError::NoAttributes);
        }

        let mut skip = vec![false; dataset.column_count()];
        skip[dataset.class_column_index()] = true;

        let mut builder = Builder {
            dataset,
            classes: dataset.class_indices(),
            n_classes: dataset.class_value_space().len(),
            n_random_feature: self.n_random_feature.filter(|&n| n > 0),
            rng,
            arena: Vec::new(),
        };
        let rows: Vec<usize> = (0..dataset.row_count()).collect();
        let root_majority = dataset.majority_class(&rows).unwrap_or(0);
        let root = builder.build_node(rows, &skip, root_majority)?;
        let nodes = builder.arena;

        debug!(root_index = root.index(), n_nodes = nodes.len(), "decision tree built");

        Ok(DecisionTree {
            nodes,
            class_values: dataset.class_value_space().to_vec(),
            class_index: dataset.class_column_index(),
            column_names: dataset.columns().iter().map(|c| c.name().to_string()).collect(),
            column_kinds: dataset.columns().iter().map(|c| c.kind()).collect(),
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Builder<'a, R> {
    dataset: &'a Dataset,
    classes: &'a [usize],
    n_classes: usize,
    n_random_feature: Option<usize>,
    rng: &'a mut R,
    arena: Vec<Node>,
}

impl<R: Rng> Builder<'_, R> {
    fn push_leaf(&mut self, label: usize, n_samples: usize) -> NodeIndex {
        let idx = self.arena.len();
        self.arena.push(Node::Leaf { label, n_samples });
        NodeIndex::new(idx)
    }

    /// Build the subtree for `rows`, returning its arena index.
    ///
    /// `skip[c]` excludes column `c` from the search. `parent_majority`
    /// labels the leaf when `rows` is empty.
    fn build_node(
        &mut self,
        rows: Vec<usize>,
        skip: &[bool],
        parent_majority: usize,
    ) -> Result<NodeIndex, ForestError> {
        let n_rows = rows.len();
        if rows.is_empty() {
            return Ok(self.push_leaf(parent_majority, 0));
        }

        let mut counts = vec![0usize; self.n_classes];
        for &r in &rows {
            counts[self.classes[r]] += 1;
        }
        let majority = first_max(&counts).unwrap_or(parent_majority);
        if counts.iter().filter(|&&c| c > 0).count() == 1 {
            return Ok(self.push_leaf(majority, n_rows));
        }

        let candidates = self.candidate_attributes(skip);
        let mut best: Option<(usize, GainRecord)> = None;
        for column in candidates {
            let record = self.evaluate(column, &rows);
            if record.gain.is_nan() {
                return Err(ForestError::DegenerateSplit { column, n_rows });
            }
            let current = best.as_ref().map_or(0.0, |(_, b)| b.gain);
            if record.is_informative() && record.gain > current {
                best = Some((column, record));
            }
        }

        let Some((column, record)) = best else {
            return Ok(self.push_leaf(majority, n_rows));
        };
        if !record.gain.is_finite() {
            return Err(ForestError::DegenerateSplit { column, n_rows });
        }
        let Some(rule) = record.split else {
            return Ok(self.push_leaf(majority, n_rows));
        };

        let ordered: Vec<usize> = match &record.sorted_index {
            Some(perm) => perm.iter().map(|&k| rows[k]).collect(),
            None => rows,
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = ordered
            .into_iter()
            .partition(|&r| goes_left(&rule, self.dataset.value(r, column)));

        let mut child_skip = skip.to_vec();
        child_skip[column] = true;

        // Reserve the slot so children get higher indices, then overwrite.
        let node_idx = self.push_leaf(majority, n_rows);
        let left = self.build_node(left_rows, &child_skip, majority)?;
        let right = self.build_node(right_rows, &child_skip, majority)?;

        self.arena[node_idx.index()] = Node::Split {
            feature: FeatureIndex::new(column),
            rule,
            left,
            right,
            impurity: Impurity::new(record.impurity),
            gain: record.gain,
            n_samples: n_rows,
        };

        Ok(node_idx)
    }

    /// Eligible columns in ascending order, restricted to a random subset
    /// when `n_random_feature` is below the eligible count.
    fn candidate_attributes(&mut self, skip: &[bool]) -> Vec<usize> {
        let mut eligible: Vec<usize> = (0..skip.len()).filter(|&c| !skip[c]).collect();
        let Some(take) = self.n_random_feature else {
            return eligible;
        };
        if take >= eligible.len() {
            return eligible;
        }
        // Partial Fisher-Yates over the first `take` positions.
        let n = eligible.len();
        for i in 0..take {
            let j = self.rng.gen_range(i..n);
            eligible.swap(i, j);
        }
        eligible.truncate(take);
        eligible.sort_unstable();
        eligible
    }

    fn evaluate(&self, column: usize, rows: &[usize]) -> GainRecord {
        let classes: Vec<usize> = rows.iter().map(|&r| self.classes[r]).collect();
        if let Some(all) = self.dataset.continuous_values(column) {
            let values: Vec<f64> = rows.iter().map(|&r| all[r]).collect();
            evaluate_continuous(&values, &classes, self.n_classes)
        } else if let (Some(all), Some(space)) = (
            self.dataset.discrete_values(column),
            self.dataset.discrete_value_space(column),
        ) {
            let values: Vec<String> = rows.iter().map(|&r| all[r].clone()).collect();
            evaluate_discrete(&values, space, &classes, self.n_classes)
        } else {
            GainRecord::skipped()
        }
    }
}

/// Routing predicate shared by training and classification.
fn goes_left(rule: &SplitRule, value: Option<ValueRef<'_>>) -> bool {
    match (rule, value) {
        (SplitRule::Threshold(t), Some(ValueRef::Continuous(v))) => v < *t,
        (SplitRule::Subset(kept), Some(ValueRef::Discrete(v))) => kept.iter().any(|k| k == v),
        _ => false,
    }
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references; the root is
/// node 0. Leaf labels index into [`class_values`](Self::class_values).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) class_values: Vec<String>,
    pub(crate) class_index: usize,
    pub(crate) column_names: Vec<String>,
    pub(crate) column_kinds: Vec<ColumnKind>,
}

impl DecisionTree {
    /// Assemble a tree from an explicit node arena.
    ///
    /// Used for hand-built trees. Node 0 is the root and every child sits
    /// after its parent in the arena, as in trees grown by
    /// [`DecisionTreeConfig::fit`].
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |---|---|
    /// | `nodes` is empty | [`ForestError::EmptyTree`] |
    /// | a child index is not after its parent or past the end | [`ForestError::InvalidChild`] |
    pub fn from_nodes(
        nodes: Vec<Node>,
        class_values: Vec<String>,
        class_index: usize,
        column_kinds: Vec<ColumnKind>,
    ) -> Result<Self, ForestError> {
        if nodes.is_empty() {
            return Err(ForestError::EmptyTree);
        }
        let n_nodes = nodes.len();
        for (node, n) in nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = n {
                for child in [left.index(), right.index()] {
                    if child <= node || child >= n_nodes {
                        return Err(ForestError::InvalidChild {
                            node,
                            child,
                            n_nodes,
                        });
                    }
                }
            }
        }
        let column_names = (0..column_kinds.len()).map(|i| format!("c{i}")).collect();
        Ok(Self {
            nodes,
            class_values,
            class_index,
            column_names,
            column_kinds,
        })
    }

    /// Predicted class of `row`, as an index into [`class_values`](Self::class_values).
    ///
    /// At each split, goes left when a continuous value is below the
    /// threshold or a discrete value is in the kept subset, right otherwise.
    #[must_use]
    pub fn classify(&self, dataset: &Dataset, row: usize) -> usize {
        match &self.nodes[self.leaf_index(dataset, row).index()] {
            Node::Leaf { label, .. } => *label,
            // leaf_index always stops at a leaf.
            Node::Split { .. } => 0,
        }
    }

    /// Predicted class label of `row`.
    #[must_use]
    pub fn classify_label(&self, dataset: &Dataset, row: usize) -> &str {
        self.class_values
            .get(self.classify(dataset, row))
            .map_or("", String::as_str)
    }

    /// Arena index of the leaf that `row` reaches.
    #[must_use]
    pub fn leaf_index(&self, dataset: &Dataset, row: usize) -> NodeIndex {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return NodeIndex::new(idx),
                Node::Split {
                    feature,
                    rule,
                    left,
                    right,
                    ..
                } => {
                    idx = if goes_left(rule, dataset.value(row, feature.index())) {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Classify every row of `dataset` and tabulate against its class column.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::ColumnCountMismatch`] | column count differs from training |
    /// | [`ForestError::ClassColumnMismatch`] | class column differs from training |
    /// | [`ForestError::ColumnMismatch`] | a column kind differs from training |
    /// | [`ForestError::UnknownClassValue`] | a class label is outside the tree's value space |
    pub fn classify_set(
        &self,
        dataset: &Dataset,
    ) -> Result<(Vec<usize>, ConfusionMatrix), ForestError> {
        check_layout(dataset, self.class_index, &self.column_kinds)?;
        let actual = map_actual(dataset, &self.class_values)?;
        let predictions: Vec<usize> = (0..dataset.row_count())
            .map(|r| self.classify(dataset, r))
            .collect();
        let matrix = ConfusionMatrix::from_labels(&actual, &predictions, &self.class_values)?;
        Ok((predictions, matrix))
    }

    /// Return the node arena.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the class value space leaf labels index into.
    #[must_use]
    pub fn class_values(&self) -> &[String] {
        &self.class_values
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, idx: usize, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match &self.nodes[idx] {
            Node::Leaf { label, n_samples } => {
                let name = self.class_values.get(*label).map_or("?", String::as_str);
                writeln!(f, "{indent}-> {name} ({n_samples})")
            }
            Node::Split {
                feature,
                rule,
                left,
                right,
                gain,
                ..
            } => {
                let name = self
                    .column_names
                    .get(feature.index())
                    .map_or("?", String::as_str);
                writeln!(f, "{indent}{name} {rule} (gain {gain:.4})")?;
                self.fmt_node(f, left.index(), depth + 1)?;
                self.fmt_node(f, right.index(), depth + 1)
            }
        }
    }
}

impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return Ok(());
        }
        self.fmt_node(f, 0, 0)
    }
}

/// Check that `dataset` has the column layout a model was trained on.
pub(crate) fn check_layout(
    dataset: &Dataset,
    class_index: usize,
    kinds: &[ColumnKind],
) -> Result<(), ForestError> {
    if dataset.column_count() != kinds.len() {
        return Err(ForestError::ColumnCountMismatch {
            expected: kinds.len(),
            got: dataset.column_count(),
        });
    }
    if dataset.class_column_index() != class_index {
        return Err(ForestError::ClassColumnMismatch {
            expected: class_index,
            got: dataset.class_column_index(),
        });
    }
    for (column, (col, &expected)) in dataset.columns().iter().zip(kinds).enumerate() {
        if col.kind() != expected {
            return Err(ForestError::ColumnMismatch {
                column,
                expected,
                got: col.kind(),
            });
        }
    }
    Ok(())
}

/// Class labels of `dataset` as indices into `class_values`.
pub(crate) fn map_actual(
    dataset: &Dataset,
    class_values: &[String],
) -> Result<Vec<usize>, ForestError> {
    if dataset.class_value_space() == class_values {
        return Ok(dataset.class_indices().to_vec());
    }
    dataset
        .class_labels()
        .iter()
        .map(|label| {
            class_values
                .iter()
                .position(|v| v == label)
                .ok_or_else(|| ForestError::UnknownClassValue {
                    label: label.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylvan_data::Column;

    fn make_continuous() -> Dataset {
        Dataset::new(
            vec![
                Column::continuous("a", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                Column::discrete_from_strs("class", &["P", "P", "N", "N", "N"]),
            ],
            1,
        )
        .unwrap()
    }

    fn make_tennis() -> Dataset {
        Dataset::new(
            vec![
                Column::discrete_from_strs(
                    "outlook",
                    &["sunny", "sunny", "overcast", "rainy", "rainy", "rainy", "overcast", "sunny"],
                ),
                Column::continuous("humidity", vec![85.0, 90.0, 78.0, 96.0, 80.0, 70.0, 65.0, 95.0]),
                Column::discrete_from_strs("windy", &["f", "t", "f", "f", "f", "t", "f", "f"]),
                Column::discrete_from_strs(
                    "play",
                    &["no", "no", "yes", "yes", "yes", "no", "yes", "no"],
                ),
            ],
            3,
        )
        .unwrap()
    }

    /// Rows reaching each node, gathered by traversal.
    fn rows_per_node(tree: &DecisionTree, ds: &Dataset) -> Vec<Vec<usize>> {
        let mut per_node = vec![Vec::new(); tree.n_nodes()];
        for row in 0..ds.row_count() {
            let mut idx = 0usize;
            loop {
                per_node[idx].push(row);
                match &tree.nodes[idx] {
                    Node::Leaf { .. } => break,
                    Node::Split { feature, rule, left, right, .. } => {
                        idx = if goes_left(rule, ds.value(row, feature.index())) {
                            left.index()
                        } else {
                            right.index()
                        };
                    }
                }
            }
        }
        per_node
    }

    // --- Building ---

    #[test]
    fn single_class_is_single_leaf() {
        let ds = Dataset::new(
            vec![
                Column::continuous("a", vec![1.0, 2.0, 3.0]),
                Column::discrete_from_strs("class", &["x", "x", "x"]),
            ],
            1,
        )
        .unwrap();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.nodes()[0], Node::Leaf { label: 0, n_samples: 3 });
        assert_eq!(tree.classify_label(&ds, 1), "x");
    }

    #[test]
    fn continuous_root_threshold() {
        let ds = make_continuous();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        let Node::Split { rule: SplitRule::Threshold(t), gain, .. } = &tree.nodes()[0] else {
            panic!("root should be a continuous split");
        };
        assert!((*t - 2.5).abs() < 1e-12);
        assert!((gain - 0.48).abs() < 1e-9);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn constant_attributes_give_majority_leaf() {
        let ds = Dataset::new(
            vec![
                Column::continuous("a", vec![1.0, 1.0, 1.0]),
                Column::discrete_from_strs("class", &["y", "x", "x"]),
            ],
            1,
        )
        .unwrap();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.classify_label(&ds, 0), "x");
    }

    #[test]
    fn training_rows_are_fit_exactly_when_separable() {
        let ds = make_tennis();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        let (predictions, matrix) = tree.classify_set(&ds).unwrap();
        assert_eq!(predictions, ds.class_indices());
        assert!((matrix.accuracy() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn split_attribute_not_reused_below_itself() {
        let ds = make_tennis();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        fn check(tree: &DecisionTree, idx: usize, ancestors: &mut Vec<usize>) {
            if let Node::Split { feature, left, right, .. } = &tree.nodes[idx] {
                assert!(!ancestors.contains(&feature.index()));
                ancestors.push(feature.index());
                check(tree, left.index(), ancestors);
                check(tree, right.index(), ancestors);
                ancestors.pop();
            }
        }
        check(&tree, 0, &mut Vec::new());
    }

    #[test]
    fn partition_completeness() {
        let ds = make_tennis();
        let tree = DecisionTreeConfig::new().fit(&ds).unwrap();
        let per_node = rows_per_node(&tree, &ds);
        for (idx, node) in tree.nodes().iter().enumerate() {
            if let Node::Split { left, right, n_samples, .. } = node {
                let mut children = per_node[left.index()].clone();
                children.extend(&per_node[right.index()]);
                children.sort_unstable();
                assert_eq!(children, per_node[idx]);
                assert_eq!(*n_samples, per_node[idx].len());
            }
        }
    }

    #[test]
    fn leaf_purity_matches_training_majority() {
        let ds = make_tennis();
        let tree = DecisionTreeConfig::new()
            .with_n_random_feature(Some(1))
            .with_seed(3)
            .fit(&ds)
            .unwrap();
        let per_node = rows_per_node(&tree, &ds);
        for (idx, node) in tree.nodes().iter().enumerate() {
            if let Node::Leaf { label, n_samples } = node {
                assert_eq!(*n_samples, per_node[idx].len());
                if let Some(majority) = ds.majority_class(&per_node[idx]) {
                    assert_eq!(*label, majority);
                }
            }
        }
    }

    #[test]
    fn empty_rows_take_parent_majority() {
        let ds = make_continuous();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut builder = Builder {
            dataset: &ds,
            classes: ds.class_indices(),
            n_classes: 2,
            n_random_feature: None,
            rng: &mut rng,
            arena: Vec::new(),
        };
        let idx = builder.build_node(Vec::new(), &[false, true], 1).unwrap();
        assert_eq!(builder.arena[idx.index()], Node::Leaf { label: 1, n_samples: 0 });
    }

    #[test]
    fn deterministic_with_same_seed() {
        let ds = make_tennis();
        let config = DecisionTreeConfig::new().with_n_random_feature(Some(1)).with_seed(9);
        assert_eq!(config.fit(&ds).unwrap(), config.fit(&ds).unwrap());
    }

    #[test]
    fn empty_dataset_error() {
        let ds = make_continuous().subset_rows(&[]).unwrap();
        let err = DecisionTreeConfig::new().fit(&ds).unwrap_err();
        assert!(matches!(err, ForestError::EmptyDataset));
    }

    #[test]
    fn class_only_dataset_error() {
        let ds = Dataset::new(vec![Column::discrete_from_strs("class", &["a"])], 0).unwrap();
        let err = DecisionTreeConfig::new().fit(&ds).unwrap_err();
        assert!(matches!(err, ForestError::NoAttributes));
    }

    // --- Classification ---

    #[test]
    fn discrete_root_routes_by_membership() {
        // Root: outlook in {overcast} -> "yes", otherwise "no".
        let tree = DecisionTree::from_nodes(
            vec![
                Node::Split {
                    feature: FeatureIndex::new(0),
                    rule: SplitRule::Subset(vec!["overcast".into()]),
                    left: NodeIndex::new(1),
                    right: NodeIndex::new(2),
                    impurity: Impurity::new(0.5),
                    gain: 0.25,
                    n_samples: 4,
                },
                Node::Leaf { label: 1, n_samples: 2 },
                Node::Leaf { label: 0, n_samples: 2 },
            ],
            vec!["no".into(), "yes".into()],
            1,
            vec![ColumnKind::Discrete, ColumnKind::Discrete],
        )
        .unwrap();
        let ds = Dataset::new(
            vec![
                Column::discrete_from_strs("outlook", &["overcast", "sunny", "rainy", "overcast"]),
                Column::discrete_from_strs("play", &["yes", "no", "no", "no"]),
            ],
            1,
        )
        .unwrap();
        assert_eq!(tree.leaf_index(&ds, 0), NodeIndex::new(1));
        assert_eq!(tree.leaf_index(&ds, 1), NodeIndex::new(2));
        assert_eq!(tree.classify_label(&ds, 0), "yes");
        assert_eq!(tree.classify_label(&ds, 2), "no");

        let (predictions, matrix) = tree.classify_set(&ds).unwrap();
        assert_eq!(predictions, vec![1, 0, 0, 1]);
        assert_eq!(matrix.n_samples(), 4);
    }

    #[test]
    fn from_nodes_rejects_empty_arena() {
        let err = DecisionTree::from_nodes(
            Vec::new(),
            vec!["no".into(), "yes".into()],
            1,
            vec![ColumnKind::Discrete, ColumnKind::Discrete],
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::EmptyTree));
    }

    #[test]
    fn from_nodes_rejects_bad_child_index() {
        let split = |left: usize, right: usize| Node::Split {
            feature: FeatureIndex::new(0),
            rule: SplitRule::Threshold(1.0),
            left: NodeIndex::new(left),
            right: NodeIndex::new(right),
            impurity: Impurity::new(0.5),
            gain: 0.5,
            n_samples: 2,
        };
        let leaf = Node::Leaf { label: 0, n_samples: 1 };
        let kinds = vec![ColumnKind::Continuous, ColumnKind::Discrete];
        let classes = vec!["a".to_string(), "b".to_string()];

        // Past the end.
        let err = DecisionTree::from_nodes(
            vec![split(1, 5), leaf.clone()],
            classes.clone(),
            1,
            kinds.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::InvalidChild { node: 0, child: 5, n_nodes: 2 }));

        // Self loop.
        let err = DecisionTree::from_nodes(
            vec![split(0, 1), leaf.clone()],
            classes.clone(),
            1,
            kinds.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::InvalidChild { node: 0, child: 0, .. }));

        let ok = DecisionTree::from_nodes(vec![split(1, 2), leaf.clone(), leaf], classes, 1, kinds);
        assert!(ok.is_ok());
    }

    #[test]
    fn classify_set_rejects_other_layout() {
        let tree = DecisionTreeConfig::new().fit(&make_continuous()).unwrap();
        let err = tree.classify_set(&make_tennis()).unwrap_err();
        assert!(matches!(err, ForestError::ColumnCountMismatch { expected: 2, got: 4 }));
    }

    #[test]
    fn classify_set_rejects_unknown_label() {
        let tree = DecisionTreeConfig::new().fit(&make_continuous()).unwrap();
        let other = Dataset::new(
            vec![
                Column::continuous("a", vec![1.0]),
                Column::discrete_from_strs("class", &["Q"]),
            ],
            1,
        )
        .unwrap();
        let err = tree.classify_set(&other).unwrap_err();
        assert!(matches!(err, ForestError::UnknownClassValue { .. }));
    }

    #[test]
    fn display_indents_children() {
        let tree = DecisionTreeConfig::new().fit(&make_continuous()).unwrap();
        let text = format!("{tree}");
        assert!(text.starts_with("a < 2.5"));
        assert!(text.contains("\n  -> P (2)"));
        assert!(text.contains("\n  -> N (3)"));
    }
}
