//! Immutable-shape tabular dataset with a designated class column.

use std::collections::HashMap;

use tracing::debug;

use crate::column::{Column, ColumnValues, ValueRef};
use crate::DataError;

/// An ordered set of typed columns with one discrete class column.
///
/// Rows are addressed by index `0..row_count()`. The class value space is the
/// ordered list of distinct class labels; index 0 is treated as the positive
/// class by binary statistics.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DataError::NoColumns`] | `columns` is empty |
/// | [`DataError::ColumnLengthMismatch`] | Columns hold different row counts |
/// | [`DataError::ClassIndexOutOfRange`] | `class_index >= columns.len()` |
/// | [`DataError::ContinuousClass`] | Class column is continuous |
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    class_index: usize,
    class_value_space: Vec<String>,
    /// Class label of each row as an index into `class_value_space`.
    class_ids: Vec<usize>,
}

impl Dataset {
    /// Build a dataset from columns, validating shape and the class column.
    pub fn new(columns: Vec<Column>, class_index: usize) -> Result<Self, DataError> {
        let first = columns.first().ok_or(DataError::NoColumns)?;
        let n_rows = first.len();
        for (i, col) in columns.iter().enumerate() {
            if col.len() != n_rows {
                return Err(DataError::ColumnLengthMismatch {
                    column: i,
                    expected: n_rows,
                    got: col.len(),
                });
            }
        }

        let class_col = columns
            .get(class_index)
            .ok_or(DataError::ClassIndexOutOfRange {
                class_index,
                n_columns: columns.len(),
            })?;
        let ColumnValues::Discrete(labels) = class_col.values() else {
            return Err(DataError::ContinuousClass { class_index });
        };
        let class_value_space = class_col.value_space().to_vec();
        let class_ids = map_labels(labels, &class_value_space)?;

        debug!(
            n_rows,
            n_columns = columns.len(),
            n_classes = class_value_space.len(),
            "dataset built"
        );

        Ok(Self {
            columns,
            class_index,
            class_value_space,
            class_ids,
        })
    }

    /// Replace the class value space with an explicit ordering.
    ///
    /// Every label in the class column must appear in `value_space`. Labels in
    /// `value_space` that never occur in the data are kept.
    ///
    /// # Errors
    ///
    /// [`DataError::LabelOutsideValueSpace`] if a class label is missing.
    pub fn with_class_value_space(mut self, value_space: Vec<String>) -> Result<Self, DataError> {
        let labels = self.class_labels();
        self.class_ids = map_labels(labels, &value_space)?;
        self.class_value_space = value_space;
        Ok(self)
    }

    /// Number of columns, class column included.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.class_ids.len()
    }

    /// Return `true` if the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.class_ids.is_empty()
    }

    /// Index of the class column.
    #[must_use]
    pub fn class_column_index(&self) -> usize {
        self.class_index
    }

    /// Ordered distinct class labels.
    #[must_use]
    pub fn class_value_space(&self) -> &[String] {
        &self.class_value_space
    }

    /// All columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column `i`, if it exists.
    #[must_use]
    pub fn column(&self, i: usize) -> Option<&Column> {
        self.columns.get(i)
    }

    /// Return `true` if column `i` exists and is continuous.
    #[must_use]
    pub fn column_is_continuous(&self, i: usize) -> bool {
        self.columns.get(i).is_some_and(Column::is_continuous)
    }

    /// Values of continuous column `i`, or `None` if it is discrete or missing.
    #[must_use]
    pub fn continuous_values(&self, i: usize) -> Option<&[f64]> {
        match self.columns.get(i)?.values() {
            ColumnValues::Continuous(v) => Some(v),
            ColumnValues::Discrete(_) => None,
        }
    }

    /// Values of discrete column `i`, or `None` if it is continuous or missing.
    #[must_use]
    pub fn discrete_values(&self, i: usize) -> Option<&[String]> {
        match self.columns.get(i)?.values() {
            ColumnValues::Discrete(v) => Some(v),
            ColumnValues::Continuous(_) => None,
        }
    }

    /// Value space of discrete column `i`, or `None` if it is continuous or missing.
    #[must_use]
    pub fn discrete_value_space(&self, i: usize) -> Option<&[String]> {
        let col = self.columns.get(i)?;
        (!col.is_continuous()).then(|| col.value_space())
    }

    /// Cell at (`row`, `column`), or `None` if either index is out of range.
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<ValueRef<'_>> {
        let col = self.columns.get(column)?;
        (row < col.len()).then(|| col.get(row))
    }

    /// Class label of every row.
    #[must_use]
    pub fn class_labels(&self) -> &[String] {
        match self.columns[self.class_index].values() {
            ColumnValues::Discrete(v) => v,
            // Rejected in `new`.
            ColumnValues::Continuous(_) => &[],
        }
    }

    /// Class label of every row as an index into [`class_value_space`](Self::class_value_space).
    #[must_use]
    pub fn class_indices(&self) -> &[usize] {
        &self.class_ids
    }

    /// Most frequent class among `rows`, as a value-space index.
    ///
    /// Ties go to the class that comes first in the value space. Returns
    /// `None` when `rows` is empty or the value space is empty.
    #[must_use]
    pub fn majority_class(&self, rows: &[usize]) -> Option<usize> {
        if rows.is_empty() || self.class_value_space.is_empty() {
            return None;
        }
        let mut counts = vec![0usize; self.class_value_space.len()];
        for &r in rows {
            counts[self.class_ids[r]] += 1;
        }
        first_max(&counts)
    }

    /// Return `true` if every row carries the same class label.
    #[must_use]
    pub fn is_single_class(&self) -> bool {
        self.class_ids.windows(2).all(|w| w[0] == w[1])
    }

    /// New dataset holding the given rows in the given order.
    ///
    /// Duplicated indices produce duplicated rows. Column value spaces and the
    /// class value space are inherited from `self`.
    ///
    /// # Errors
    ///
    /// [`DataError::RowOutOfRange`] if any index is `>= row_count()`.
    pub fn subset_rows(&self, rows: &[usize]) -> Result<Self, DataError> {
        let n_rows = self.row_count();
        if let Some(&row) = rows.iter().find(|&&r| r >= n_rows) {
            return Err(DataError::RowOutOfRange { row, n_rows });
        }
        Ok(Self {
            columns: self.columns.iter().map(|c| c.gather(rows)).collect(),
            class_index: self.class_index,
            class_value_space: self.class_value_space.clone(),
            class_ids: rows.iter().map(|&r| self.class_ids[r]).collect(),
        })
    }
}

fn map_labels(labels: &[String], value_space: &[String]) -> Result<Vec<usize>, DataError> {
    let lookup: HashMap<&str, usize> = value_space
        .iter()
        .enumerate()
        .map(|(i, v)| (v.as_str(), i))
        .collect();
    labels
        .iter()
        .map(|l| {
            lookup
                .get(l.as_str())
                .copied()
                .ok_or_else(|| DataError::LabelOutsideValueSpace { label: l.clone() })
        })
        .collect()
}

/// Index of the largest count; ties go to the lowest index.
#[must_use]
pub fn first_max(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, &c) in counts.iter().enumerate() {
        if best.is_none_or(|(_, bc)| c > bc) {
            best = Some((i, c));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset() -> Dataset {
        Dataset::new(
            vec![
                Column::continuous("a", vec![1.0, 2.0, 3.0, 4.0]),
                Column::discrete_from_strs("b", &["x", "y", "x", "z"]),
                Column::discrete_from_strs("class", &["no", "yes", "yes", "no"]),
            ],
            2,
        )
        .unwrap()
    }

    // --- Construction ---

    #[test]
    fn new_valid() {
        let ds = make_dataset();
        assert_eq!(ds.column_count(), 3);
        assert_eq!(ds.row_count(), 4);
        assert_eq!(ds.class_column_index(), 2);
        assert_eq!(ds.class_value_space(), &["no", "yes"]);
        assert_eq!(ds.class_indices(), &[0, 1, 1, 0]);
    }

    #[test]
    fn new_no_columns() {
        assert!(matches!(Dataset::new(vec![], 0), Err(DataError::NoColumns)));
    }

    #[test]
    fn new_length_mismatch() {
        let result = Dataset::new(
            vec![
                Column::continuous("a", vec![1.0, 2.0]),
                Column::discrete_from_strs("c", &["x"]),
            ],
            1,
        );
        assert!(matches!(
            result,
            Err(DataError::ColumnLengthMismatch { column: 1, expected: 2, got: 1 })
        ));
    }

    #[test]
    fn new_class_out_of_range() {
        let result = Dataset::new(vec![Column::discrete_from_strs("c", &["x"])], 3);
        assert!(matches!(result, Err(DataError::ClassIndexOutOfRange { .. })));
    }

    #[test]
    fn new_continuous_class() {
        let result = Dataset::new(vec![Column::continuous("c", vec![1.0])], 0);
        assert!(matches!(result, Err(DataError::ContinuousClass { class_index: 0 })));
    }

    #[test]
    fn explicit_value_space_reorders_indices() {
        let ds = make_dataset()
            .with_class_value_space(vec!["yes".into(), "no".into()])
            .unwrap();
        assert_eq!(ds.class_value_space(), &["yes", "no"]);
        assert_eq!(ds.class_indices(), &[1, 0, 0, 1]);
    }

    #[test]
    fn explicit_value_space_missing_label() {
        let result = make_dataset().with_class_value_space(vec!["yes".into()]);
        assert!(matches!(result, Err(DataError::LabelOutsideValueSpace { .. })));
    }

    // --- Accessors ---

    #[test]
    fn typed_accessors() {
        let ds = make_dataset();
        assert!(ds.column_is_continuous(0));
        assert!(!ds.column_is_continuous(1));
        assert!(!ds.column_is_continuous(9));
        assert_eq!(ds.continuous_values(0).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(ds.continuous_values(1).is_none());
        assert_eq!(ds.discrete_values(1).unwrap()[3], "z");
        assert_eq!(ds.discrete_value_space(1).unwrap(), &["x", "y", "z"]);
        assert!(ds.discrete_value_space(0).is_none());
        assert_eq!(ds.value(1, 0), Some(ValueRef::Continuous(2.0)));
        assert_eq!(ds.value(1, 1), Some(ValueRef::Discrete("y")));
        assert_eq!(ds.value(10, 1), None);
    }

    #[test]
    fn majority_class_ties_go_first() {
        let ds = make_dataset();
        assert_eq!(ds.majority_class(&[0, 1, 2, 3]), Some(0));
        assert_eq!(ds.majority_class(&[1, 2, 3]), Some(1));
        assert_eq!(ds.majority_class(&[]), None);
    }

    #[test]
    fn single_class_detection() {
        assert!(!make_dataset().is_single_class());
        let ds = make_dataset().subset_rows(&[1, 2]).unwrap();
        assert!(ds.is_single_class());
    }

    // --- Subsetting ---

    #[test]
    fn subset_rows_duplicates_and_inheritance() {
        let ds = make_dataset();
        let sub = ds.subset_rows(&[3, 3, 1]).unwrap();
        assert_eq!(sub.row_count(), 3);
        assert_eq!(sub.continuous_values(0).unwrap(), &[4.0, 4.0, 2.0]);
        assert_eq!(sub.class_labels(), &["no", "no", "yes"]);
        assert_eq!(sub.discrete_value_space(1).unwrap(), &["x", "y", "z"]);
        assert_eq!(sub.class_value_space(), ds.class_value_space());
        // The original is untouched.
        assert_eq!(ds.row_count(), 4);
    }

    #[test]
    fn subset_rows_out_of_range() {
        let result = make_dataset().subset_rows(&[0, 4]);
        assert!(matches!(result, Err(DataError::RowOutOfRange { row: 4, n_rows: 4 })));
    }

    #[test]
    fn first_max_picks_lowest_index_on_tie() {
        assert_eq!(first_max(&[2, 5, 5, 1]), Some(1));
        assert_eq!(first_max(&[]), None);
    }
}
