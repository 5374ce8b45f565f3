use std::path::PathBuf;

use sylvan_data::{ColumnKind, DataError};

/// Errors from tree, forest and cascade operations.
///
/// Variants fall into four phases: dataset validation, tree construction
/// (recovered internally by the forest through a fresh bootstrap draw),
/// statistics I/O, and model persistence.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when the training dataset has zero rows.
    #[error("training dataset has zero rows")]
    EmptyDataset,

    /// Returned when the dataset has no column besides the class column.
    #[error("dataset has no attribute columns besides the class column")]
    NoAttributes,

    /// Returned when a dataset does not have the column layout a model was trained on.
    #[error("dataset has {got} columns, model expects {expected}")]
    ColumnCountMismatch {
        /// Number of columns the model was trained on.
        expected: usize,
        /// Number of columns in the dataset.
        got: usize,
    },

    /// Returned when a dataset's class column differs from the one a model was trained on.
    #[error("dataset class column is {got}, model expects {expected}")]
    ClassColumnMismatch {
        /// Class column index the model was trained on.
        expected: usize,
        /// Class column index of the dataset.
        got: usize,
    },

    /// Returned when a column's kind differs from the one a model was trained on.
    #[error("column {column} is {got}, model expects {expected}")]
    ColumnMismatch {
        /// Zero-based column index.
        column: usize,
        /// Kind seen at training time.
        expected: ColumnKind,
        /// Kind in the dataset.
        got: ColumnKind,
    },

    /// Returned when a class label is not in the model's class value space.
    #[error("class label \"{label}\" is not in the class value space")]
    UnknownClassValue {
        /// The unknown label.
        label: String,
    },

    /// Returned when a class index is outside the value space of a confusion matrix.
    #[error("class index {index} is out of range for {n_classes} classes")]
    ClassIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Size of the class value space.
        n_classes: usize,
    },

    /// Returned when actual and predicted label sequences differ in length.
    #[error("{actual} actual labels but {predicted} predictions")]
    LabelCountMismatch {
        /// Number of actual labels.
        actual: usize,
        /// Number of predicted labels.
        predicted: usize,
    },

    /// Returned when two confusion matrices over different value spaces are merged.
    #[error("cannot merge confusion matrices over different class value spaces")]
    ValueSpaceMismatch,

    /// Returned when the row ids passed to a classification do not match the row count.
    #[error("{n_ids} row ids given for {n_rows} rows")]
    RowIdCountMismatch {
        /// Number of rows in the dataset.
        n_rows: usize,
        /// Number of row ids given.
        n_ids: usize,
    },

    /// Returned when classifying with a forest that holds no trees.
    #[error("forest has no trees")]
    EmptyForest,

    /// Returned when a hand-built tree has no nodes.
    #[error("tree has no nodes")]
    EmptyTree,

    /// Returned when a split node points at a child that is not after it in the arena.
    #[error("node {node} points at child {child}, arena holds {n_nodes} nodes")]
    InvalidChild {
        /// Index of the split node.
        node: usize,
        /// Offending child index.
        child: usize,
        /// Number of nodes in the arena.
        n_nodes: usize,
    },

    /// Returned when a dataset view operation fails.
    #[error("dataset error")]
    Data {
        /// The underlying dataset error.
        #[from]
        source: DataError,
    },

    /// Returned when a bootstrap draw yields a bag with zero rows.
    #[error("bootstrap bag has zero rows")]
    EmptyBag,

    /// Returned when the best split of a node carries a non-finite gain.
    #[error("degenerate split on column {column} over {n_rows} rows")]
    DegenerateSplit {
        /// Column chosen for the split.
        column: usize,
        /// Number of rows at the node.
        n_rows: usize,
    },

    /// Returned when a statistics row cannot be written.
    #[error("failed to write statistics to {path}")]
    StatsWrite {
        /// Path to the statistics file.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}

impl ForestError {
    /// Return `true` for tree-construction failures that a fresh bootstrap
    /// draw can recover from.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForestError::EmptyBag | ForestError::DegenerateSplit { .. })
    }
}
