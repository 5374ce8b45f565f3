//! Destinations for statistics rows.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ForestError;
use crate::stats::Stat;

/// Append-only destination for [`Stat`] rows.
///
/// Rows arrive in tree-completion order and must be kept in that order.
pub trait StatsSink {
    /// Append one row.
    ///
    /// # Errors
    ///
    /// [`ForestError::StatsWrite`] if the row cannot be written.
    fn write_stat(&mut self, stat: &Stat) -> Result<(), ForestError>;

    /// Flush and release the destination after the last row.
    ///
    /// # Errors
    ///
    /// [`ForestError::StatsWrite`] if flushing fails.
    fn finish(&mut self) -> Result<(), ForestError> {
        Ok(())
    }
}

/// Writes rows to a delimited file with no header, flushing after each row.
#[derive(Debug)]
pub struct CsvStatsWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvStatsWriter {
    /// Create (or truncate) `path` with a comma delimiter.
    ///
    /// # Errors
    ///
    /// [`ForestError::StatsWrite`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        Self::with_delimiter(path, b',')
    }

    /// Create (or truncate) `path` with the given field delimiter.
    ///
    /// # Errors
    ///
    /// [`ForestError::StatsWrite`] if the file cannot be created.
    pub fn with_delimiter(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, ForestError> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_path(&path)
            .map_err(|source| ForestError::StatsWrite {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "statistics file opened");
        Ok(Self { path, writer })
    }

    /// Return the path being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> Result<(), ForestError> {
        self.writer.flush().map_err(|e| ForestError::StatsWrite {
            path: self.path.clone(),
            source: csv::Error::from(e),
        })
    }
}

impl StatsSink for CsvStatsWriter {
    fn write_stat(&mut self, stat: &Stat) -> Result<(), ForestError> {
        self.writer
            .write_record(stat.to_record())
            .map_err(|source| ForestError::StatsWrite {
                path: self.path.clone(),
                source,
            })?;
        self.flush()
    }

    fn finish(&mut self) -> Result<(), ForestError> {
        self.flush()
    }
}

/// Discards every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn write_stat(&mut self, _stat: &Stat) -> Result<(), ForestError> {
        Ok(())
    }
}

impl StatsSink for Vec<Stat> {
    fn write_stat(&mut self, stat: &Stat) -> Result<(), ForestError> {
        self.push(stat.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn csv_rows_in_order_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.csv");
        let mut sink = CsvStatsWriter::create(&path).unwrap();
        for id in 0..3 {
            sink.write_stat(&Stat { id, ..Stat::default() }).unwrap();
        }
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0,0,0,"));
        assert!(lines[2].starts_with("2,"));
        assert_eq!(lines[1].split(',').count(), 14);
    }

    #[test]
    fn rows_are_flushed_before_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.tsv");
        let mut sink = CsvStatsWriter::with_delimiter(&path, b'\t').unwrap();
        sink.write_stat(&Stat::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next().unwrap().split('\t').count(), 14);
    }

    #[test]
    fn unwritable_path_is_stats_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("stats.csv");
        let err = CsvStatsWriter::create(&path).unwrap_err();
        assert!(matches!(err, ForestError::StatsWrite { .. }));
    }

    #[test]
    fn vec_sink_collects() {
        let mut rows: Vec<Stat> = Vec::new();
        rows.write_stat(&Stat { id: 7, ..Stat::default() }).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 7);
        assert!(NullSink.write_stat(&rows[0]).is_ok());
    }
}
