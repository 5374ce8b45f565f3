//! Error types for sylvan-data.

use std::path::PathBuf;

/// Errors from dataset construction, delimited-file parsing, and row subsetting.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyFile {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of fields than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} fields, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of fields (from header).
        expected: usize,
        /// Actual number of fields in this row.
        got: usize,
    },

    /// Returned when the named class column is not in the header.
    #[error("class column \"{name}\" not found in {path}")]
    ClassColumnNotFound {
        /// Path to the CSV file.
        path: PathBuf,
        /// The requested column name.
        name: String,
    },

    /// Returned when a dataset is built from zero columns.
    #[error("dataset has no columns")]
    NoColumns,

    /// Returned when columns of one dataset hold different numbers of rows.
    #[error("column {column} has {got} rows, expected {expected}")]
    ColumnLengthMismatch {
        /// Zero-based index of the offending column.
        column: usize,
        /// Row count of the first column.
        expected: usize,
        /// Row count of the offending column.
        got: usize,
    },

    /// Returned when the class column index is not a valid column.
    #[error("class column index {class_index} is out of range for {n_columns} columns")]
    ClassIndexOutOfRange {
        /// The requested class column index.
        class_index: usize,
        /// Number of columns in the dataset.
        n_columns: usize,
    },

    /// Returned when the class column holds continuous values.
    #[error("class column {class_index} must be discrete")]
    ContinuousClass {
        /// Index of the class column.
        class_index: usize,
    },

    /// Returned when an explicit class value space misses a label present in the data.
    #[error("class label \"{label}\" is not in the class value space")]
    LabelOutsideValueSpace {
        /// The label found in the class column.
        label: String,
    },

    /// Returned when a row index passed to a subset operation is out of range.
    #[error("row index {row} is out of range for {n_rows} rows")]
    RowOutOfRange {
        /// The offending row index.
        row: usize,
        /// Number of rows in the dataset.
        n_rows: usize,
    },
}
