use std::fmt;

/// Zero-based dataset column index of a split attribute.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gini impurity of the rows that reached a node.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// How an internal node routes a row.
///
/// A continuous rule sends rows with `value < threshold` left. A discrete rule
/// sends rows whose value is in the kept subset left; the complement goes right.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SplitRule {
    /// Continuous threshold.
    Threshold(f64),
    /// Kept side of a nominal bipartition.
    Subset(Vec<String>),
}

impl SplitRule {
    /// Return `true` for a continuous threshold rule.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self, SplitRule::Threshold(_))
    }
}

impl fmt::Display for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitRule::Threshold(t) => write!(f, "< {t}"),
            SplitRule::Subset(values) => write!(f, "in {{{}}}", values.join(", ")),
        }
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`]. The root is always at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Column used for the split.
        feature: FeatureIndex,
        /// Routing rule.
        rule: SplitRule,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Gini gain of the chosen split.
        gain: f64,
        /// Number of training rows that reached this node.
        n_samples: usize,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted class as an index into the tree's class value space.
        label: usize,
        /// Number of training rows that reached this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the number of training rows that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Impurity, Node, NodeIndex, SplitRule};

    // --- Newtypes ---

    #[test]
    fn feature_index_roundtrip() {
        let fi = FeatureIndex::new(7);
        assert_eq!(fi.index(), 7);
        assert_eq!(format!("{fi}"), "7");
    }

    #[test]
    fn node_index_ordering() {
        assert!(NodeIndex::new(10) < NodeIndex::new(20));
    }

    #[test]
    fn impurity_display() {
        assert_eq!(format!("{}", Impurity::new(0.48)), "0.480000");
    }

    // --- SplitRule ---

    #[test]
    fn split_rule_display() {
        assert_eq!(format!("{}", SplitRule::Threshold(2.5)), "< 2.5");
        let subset = SplitRule::Subset(vec!["sunny".into(), "rainy".into()]);
        assert_eq!(format!("{subset}"), "in {sunny, rainy}");
        assert!(!subset.is_continuous());
    }

    // --- Node ---

    #[test]
    fn node_accessors() {
        let leaf = Node::Leaf { label: 1, n_samples: 4 };
        let split = Node::Split {
            feature: FeatureIndex::new(0),
            rule: SplitRule::Threshold(1.0),
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: Impurity::new(0.5),
            gain: 0.5,
            n_samples: 8,
        };
        assert!(leaf.is_leaf());
        assert!(!split.is_leaf());
        assert_eq!(leaf.n_samples(), 4);
        assert_eq!(split.n_samples(), 8);
    }
}
