//! Typed tabular dataset view, delimited-file loading, and set-partition helpers.

mod column;
mod dataset;
mod error;
pub mod partition;
mod reader;

pub use column::{Column, ColumnKind, ColumnValues, ValueRef};
pub use dataset::{first_max, Dataset};
pub use error::DataError;
pub use reader::{ClassColumn, DatasetReader};
