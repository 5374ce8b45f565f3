//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::RandomForest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of trees in the forest.
    n_trees: usize,
    /// Number of dataset columns, class column included.
    n_columns: usize,
    /// Number of classes.
    n_classes: usize,
    /// Column names seen at training time.
    column_names: Vec<String>,
    /// The serialized forest.
    forest: RandomForest,
}

impl RandomForest {
    /// Save the forest, bag ids and training statistics to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: self.trees.len(),
            n_columns: self.column_kinds.len(),
            n_classes: self.class_values.len(),
            column_names: self.column_names.clone(),
            forest: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|source| ForestError::SerializeModel { source })?;

        std::fs::write(path, &bytes).map_err(|source| ForestError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.trees.len(),
            "model saved"
        );

        Ok(())
    }

    /// Load a forest written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|source| ForestError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|source| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            n_trees = envelope.n_trees,
            n_columns = envelope.n_columns,
            n_classes = envelope.n_classes,
            columns = ?envelope.column_names,
            "model loaded"
        );

        Ok(envelope.forest)
    }
}

#[cfg(test)]
mod tests {
    use sylvan_data::{Column, Dataset};
    use tempfile::TempDir;

    use crate::config::ForestConfig;
    use crate::error::ForestError;
    use crate::forest::RandomForest;

    fn train_simple_model() -> (RandomForest, Dataset) {
        let ds = Dataset::new(
            vec![
                Column::continuous("x", vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]),
                Column::discrete_from_strs("kind", &["s", "s", "m", "m", "s", "m"]),
                Column::discrete_from_strs("class", &["lo", "lo", "lo", "hi", "hi", "hi"]),
            ],
            2,
        )
        .unwrap();
        let forest = ForestConfig::new().with_n_tree(5).fit(&ds).unwrap();
        (forest, ds)
    }

    #[test]
    fn round_trip_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("test_model.bin");

        let (forest, ds) = train_simple_model();
        forest.save(&model_path).unwrap();
        let loaded = RandomForest::load(&model_path).unwrap();

        assert_eq!(loaded.trees(), forest.trees());
        assert_eq!(loaded.bag_indices(), forest.bag_indices());
        assert_eq!(loaded.stats(), forest.stats());
        assert_eq!(
            loaded.classify_set(&ds, None).unwrap(),
            forest.classify_set(&ds, None).unwrap()
        );
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, ForestError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::DeserializeModel { .. }));
    }

    #[test]
    fn version_mismatch_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.bin");
        let (forest, _) = train_simple_model();
        forest.save(&path).unwrap();

        // The version is the first field: a little-endian u32.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ForestError::IncompatibleModelVersion { expected: 1, found: 99, .. }
        ));
    }
}
