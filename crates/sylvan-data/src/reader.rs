//! Delimited-file dataset reader.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::column::Column;
use crate::{DataError, Dataset};

/// Which column of the file holds the class label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassColumn {
    /// The last column.
    #[default]
    Last,
    /// The column whose header matches this name.
    Name(String),
    /// The column at this zero-based index.
    Index(usize),
}

/// Reads a [`Dataset`] from a delimited text file.
///
/// Expected format:
/// - Header row with column names (disable with [`with_header`](Self::with_header))
/// - One record per row, every record with the same number of fields
///
/// The class column is always discrete. Any other column is continuous when
/// every one of its cells parses as a finite `f64`; otherwise it is discrete.
///
/// | Option | Default |
/// |---|---|
/// | `delimiter` | `b','` |
/// | `header` | `true` |
/// | `class_column` | [`ClassColumn::Last`] |
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DataError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`DataError::CsvParse`] | Malformed record |
/// | [`DataError::EmptyFile`] | Zero data rows |
/// | [`DataError::InconsistentRowLength`] | Row has a different field count than the first row |
/// | [`DataError::ClassColumnNotFound`] | Named class column is missing from the header |
/// | [`DataError::ClassIndexOutOfRange`] | Class column index is past the last field |
pub struct DatasetReader {
    path: PathBuf,
    delimiter: u8,
    header: bool,
    class_column: ClassColumn,
}

impl DatasetReader {
    /// Create a new reader for the given file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b',',
            header: true,
            class_column: ClassColumn::Last,
        }
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether the first record is a header row.
    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Set the class column.
    #[must_use]
    pub fn with_class_column(mut self, class_column: ClassColumn) -> Self {
        self.class_column = class_column;
        self
    }

    /// Read and validate the file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, DataError> {
        let file = std::fs::File::open(&self.path).map_err(|e| DataError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so our InconsistentRowLength check fires instead of a
        // low-level parse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.header)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let names: Option<Vec<String>> = if self.header {
            let header = rdr.headers().map_err(|e| self.parse_error(e))?;
            Some(header.iter().map(String::from).collect())
        } else {
            None
        };

        let mut cells: Vec<Vec<String>> = Vec::new();
        let mut expected = names.as_ref().map(Vec::len);
        let mut n_rows = 0usize;

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.parse_error(e))?;
            let width = *expected.get_or_insert(record.len());
            if record.len() != width {
                return Err(DataError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: width,
                    got: record.len(),
                });
            }
            if cells.is_empty() {
                cells = vec![Vec::new(); width];
            }
            for (col, field) in cells.iter_mut().zip(record.iter()) {
                col.push(field.to_string());
            }
            n_rows += 1;
        }

        if n_rows == 0 {
            return Err(DataError::EmptyFile {
                path: self.path.clone(),
            });
        }

        let n_columns = cells.len();
        let names = names.unwrap_or_else(|| (0..n_columns).map(|i| format!("c{i}")).collect());
        debug!(n_columns, n_rows, "read records");

        let class_index = self.resolve_class_index(&names)?;
        let columns: Vec<Column> = names
            .into_iter()
            .zip(cells)
            .enumerate()
            .map(|(i, (name, raw))| {
                if i == class_index {
                    Column::discrete(name, raw)
                } else {
                    infer_column(name, raw)
                }
            })
            .collect();

        let n_continuous = columns.iter().filter(|c| c.is_continuous()).count();
        let dataset = Dataset::new(columns, class_index)?;

        info!(
            n_rows = dataset.row_count(),
            n_columns = dataset.column_count(),
            n_continuous,
            n_classes = dataset.class_value_space().len(),
            class_index,
            "dataset loaded"
        );

        Ok(dataset)
    }

    fn resolve_class_index(&self, names: &[String]) -> Result<usize, DataError> {
        match &self.class_column {
            ClassColumn::Last => Ok(names.len().saturating_sub(1)),
            ClassColumn::Index(i) if *i < names.len() => Ok(*i),
            ClassColumn::Index(i) => Err(DataError::ClassIndexOutOfRange {
                class_index: *i,
                n_columns: names.len(),
            }),
            ClassColumn::Name(name) => names.iter().position(|n| n == name).ok_or_else(|| {
                DataError::ClassColumnNotFound {
                    path: self.path.clone(),
                    name: name.clone(),
                }
            }),
        }
    }

    fn parse_error(&self, e: csv::Error) -> DataError {
        DataError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Continuous if every cell is a finite float, discrete otherwise.
fn infer_column(name: String, raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw
        .iter()
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    match parsed {
        Some(values) => Column::continuous(name, values),
        None => Column::discrete(name, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_mixed_columns() {
        let csv = "outlook,temp,play\nsunny,85,no\nrain,70.5,yes\novercast,64,yes\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path()).read().unwrap();
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column_count(), 3);
        assert_eq!(ds.class_column_index(), 2);
        assert!(!ds.column_is_continuous(0));
        assert!(ds.column_is_continuous(1));
        assert_eq!(ds.continuous_values(1).unwrap(), &[85.0, 70.5, 64.0]);
        assert_eq!(ds.class_value_space(), &["no", "yes"]);
    }

    #[test]
    fn numeric_class_column_stays_discrete() {
        let csv = "x,label\n1.0,1\n2.0,0\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path()).read().unwrap();
        assert!(!ds.column_is_continuous(1));
        assert_eq!(ds.class_value_space(), &["1", "0"]);
    }

    #[test]
    fn non_finite_cell_makes_column_discrete() {
        let csv = "x,label\n1.0,a\nNaN,b\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path()).read().unwrap();
        assert!(!ds.column_is_continuous(0));
    }

    #[test]
    fn class_column_by_name() {
        let csv = "label,x\na,1\nb,2\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path())
            .with_class_column(ClassColumn::Name("label".into()))
            .read()
            .unwrap();
        assert_eq!(ds.class_column_index(), 0);
    }

    #[test]
    fn headerless_with_semicolon() {
        let csv = "1;a\n2;b\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path())
            .with_header(false)
            .with_delimiter(b';')
            .with_class_column(ClassColumn::Index(1))
            .read()
            .unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column(0).unwrap().name(), "c0");
    }

    #[test]
    fn error_file_not_found() {
        let result = DatasetReader::new(Path::new("/nonexistent/file.csv")).read();
        assert!(matches!(result, Err(DataError::FileNotFound { .. })));
    }

    #[test]
    fn error_empty_file() {
        let f = write_csv("x,label\n");
        let result = DatasetReader::new(f.path()).read();
        assert!(matches!(result, Err(DataError::EmptyFile { .. })));
    }

    #[test]
    fn error_inconsistent_row_length() {
        let f = write_csv("x,y,label\n1,2,a\n1,b\n");
        let result = DatasetReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(DataError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn error_class_column_not_found() {
        let f = write_csv("x,label\n1,a\n");
        let result = DatasetReader::new(f.path())
            .with_class_column(ClassColumn::Name("missing".into()))
            .read();
        assert!(matches!(result, Err(DataError::ClassColumnNotFound { .. })));
    }

    #[test]
    fn error_class_index_out_of_range() {
        let f = write_csv("x,label\n1,a\n");
        let result = DatasetReader::new(f.path())
            .with_class_column(ClassColumn::Index(5))
            .read();
        assert!(matches!(result, Err(DataError::ClassIndexOutOfRange { .. })));
    }
}
