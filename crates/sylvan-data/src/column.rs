//! Typed dataset columns.

use std::fmt;

/// Whether a column holds continuous (floating-point) or discrete (nominal) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ColumnKind {
    /// Floating-point measurements.
    Continuous,
    /// Nominal labels drawn from a finite value space.
    Discrete,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Continuous => f.write_str("continuous"),
            ColumnKind::Discrete => f.write_str("discrete"),
        }
    }
}

/// The homogeneous values of one column.
///
/// The variant is chosen once when the column is built; every row of a
/// column shares it.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// One `f64` per row.
    Continuous(Vec<f64>),
    /// One nominal label per row.
    Discrete(Vec<String>),
}

impl ColumnValues {
    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Continuous(v) => v.len(),
            ColumnValues::Discrete(v) => v.len(),
        }
    }

    /// Return `true` if the column holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the kind of values stored.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValues::Continuous(_) => ColumnKind::Continuous,
            ColumnValues::Discrete(_) => ColumnKind::Discrete,
        }
    }
}

/// A borrowed view of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    /// A continuous cell.
    Continuous(f64),
    /// A discrete cell.
    Discrete(&'a str),
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Continuous(v) => write!(f, "{v}"),
            ValueRef::Discrete(s) => f.write_str(s),
        }
    }
}

/// A named column with its values and, for discrete columns, its value space.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
    /// Distinct labels in order of first appearance. Empty for continuous columns.
    value_space: Vec<String>,
}

impl Column {
    /// Create a continuous column.
    pub fn continuous(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Continuous(values),
            value_space: Vec::new(),
        }
    }

    /// Create a discrete column. The value space is the distinct labels in
    /// order of first appearance.
    pub fn discrete(name: impl Into<String>, values: Vec<String>) -> Self {
        let value_space = distinct_in_order(&values);
        Self {
            name: name.into(),
            values: ColumnValues::Discrete(values),
            value_space,
        }
    }

    /// Create a discrete column from string slices.
    pub fn discrete_from_strs(name: impl Into<String>, values: &[&str]) -> Self {
        Self::discrete(name, values.iter().map(|s| (*s).to_string()).collect())
    }

    /// Return the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the column values.
    #[must_use]
    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    /// Return the column kind.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        self.values.kind()
    }

    /// Return `true` if the column is continuous.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.kind() == ColumnKind::Continuous
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the nominal value space (empty for continuous columns).
    #[must_use]
    pub fn value_space(&self) -> &[String] {
        &self.value_space
    }

    /// Return the cell at `row`. Panics if `row` is out of range.
    #[must_use]
    pub fn get(&self, row: usize) -> ValueRef<'_> {
        match &self.values {
            ColumnValues::Continuous(v) => ValueRef::Continuous(v[row]),
            ColumnValues::Discrete(v) => ValueRef::Discrete(&v[row]),
        }
    }

    /// Gather the given rows into a new column, keeping this column's value space.
    pub(crate) fn gather(&self, rows: &[usize]) -> Self {
        let values = match &self.values {
            ColumnValues::Continuous(v) => {
                ColumnValues::Continuous(rows.iter().map(|&r| v[r]).collect())
            }
            ColumnValues::Discrete(v) => {
                ColumnValues::Discrete(rows.iter().map(|&r| v[r].clone()).collect())
            }
        };
        Self {
            name: self.name.clone(),
            values,
            value_space: self.value_space.clone(),
        }
    }
}

/// Distinct strings in order of first appearance.
pub(crate) fn distinct_in_order(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_value_space_keeps_first_appearance_order() {
        let col = Column::discrete_from_strs("outlook", &["rain", "sunny", "rain", "overcast"]);
        assert_eq!(col.value_space(), &["rain", "sunny", "overcast"]);
        assert_eq!(col.kind(), ColumnKind::Discrete);
    }

    #[test]
    fn continuous_has_empty_value_space() {
        let col = Column::continuous("temp", vec![1.0, 2.0]);
        assert!(col.value_space().is_empty());
        assert!(col.is_continuous());
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn gather_allows_duplicates() {
        let col = Column::continuous("x", vec![10.0, 20.0, 30.0]);
        let g = col.gather(&[2, 2, 0]);
        assert_eq!(g.values(), &ColumnValues::Continuous(vec![30.0, 30.0, 10.0]));
    }

    #[test]
    fn gather_keeps_parent_value_space() {
        let col = Column::discrete_from_strs("c", &["a", "b", "c"]);
        let g = col.gather(&[1]);
        assert_eq!(g.value_space(), &["a", "b", "c"]);
    }

    #[test]
    fn value_ref_display() {
        assert_eq!(format!("{}", ValueRef::Continuous(1.5)), "1.5");
        assert_eq!(format!("{}", ValueRef::Discrete("yes")), "yes");
    }
}
