//! Model files: a bincode header followed by the forest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::RandomForest;

/// Bumped whenever the node layout or header changes.
pub const MODEL_FORMAT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct Header {
    format_version: u32,
    crate_version: String,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    header: Header,
    forest: RandomForest,
}

#[derive(Serialize)]
struct ModelFileRef<'a> {
    header: Header,
    forest: &'a RandomForest,
}

impl RandomForest {
    /// Encode the forest with its format header.
    ///
    /// `path` only labels errors.
    pub(crate) fn to_bytes(&self, path: &Path) -> Result<Vec<u8>, RfError> {
        let file = ModelFileRef {
            header: Header {
                format_version: MODEL_FORMAT_VERSION,
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            forest: self,
        };
        bincode::serialize(&file).map_err(|source| RfError::ModelEncoding {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, RfError> {
        // header alone first; an old forest layout may not decode
        let header: Header = bincode::deserialize(bytes).map_err(|source| RfError::ModelEncoding {
            path: path.to_path_buf(),
            source,
        })?;
        if header.format_version != MODEL_FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: MODEL_FORMAT_VERSION,
                found: header.format_version,
                path: path.to_path_buf(),
            });
        }
        let file: ModelFile = bincode::deserialize(bytes).map_err(|source| RfError::ModelEncoding {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(written_by = %file.header.crate_version, "model header ok");
        Ok(file.forest)
    }

    /// Write the forest to `path`.
    ///
    /// # Errors
    ///
    /// - [`RfError::ModelEncoding`] if bincode fails
    /// - [`RfError::ModelFile`] if the file cannot be written
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let bytes = self.to_bytes(path)?;
        fs::write(path, &bytes).map_err(|source| RfError::ModelFile {
            action: "write",
            path: path.to_path_buf(),
            source,
        })?;
        info!(bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Read a forest written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant                               | When                              |
    /// |---------------------------------------|-----------------------------------|
    /// | [`RfError::ModelFile`]                | the file cannot be read           |
    /// | [`RfError::ModelEncoding`]            | the bytes are not a model         |
    /// | [`RfError::IncompatibleModelVersion`] | written by another format version |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| RfError::ModelFile {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        let forest = Self::from_bytes(&bytes, path)?;
        info!(
            n_trees = forest.trees.len(),
            bands = ?forest.feature_names,
            "model loaded"
        );
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::config::RandomForestConfig;

    fn small_forest() -> RandomForest {
        let features: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64 / 12.0, 0.3]).collect();
        let labels: Vec<bool> = (0..12).map(|i| i >= 6).collect();
        let names = vec!["slope".to_string(), "soiltex".to_string()];
        RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap()
            .into_forest()
    }

    #[test]
    fn saved_model_scores_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let forest = small_forest();
        forest.save(&path).unwrap();
        let loaded = RandomForest::load(&path).unwrap();

        assert_eq!(loaded.feature_names(), forest.feature_names());
        assert_eq!(loaded.n_trees(), 5);
        for pixel in [[0.1, 0.3], [0.9, 0.3], [0.5, 0.0]] {
            assert_eq!(
                forest.probability(&pixel).unwrap(),
                loaded.probability(&pixel).unwrap()
            );
        }
    }

    #[test]
    fn other_format_version_rejected() {
        let path = Path::new("old.bin");
        let forest = small_forest();
        let stale = ModelFileRef {
            header: Header {
                format_version: MODEL_FORMAT_VERSION - 1,
                crate_version: "0.0.1".into(),
            },
            forest: &forest,
        };
        let bytes = bincode::serialize(&stale).unwrap();
        assert!(matches!(
            RandomForest::from_bytes(&bytes, path),
            Err(RfError::IncompatibleModelVersion { found, .. }) if found == MODEL_FORMAT_VERSION - 1
        ));
    }

    #[test]
    fn missing_file_reported_as_read_failure() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, RfError::ModelFile { action: "read", .. }));
        assert!(err.to_string().contains("absent.bin"));
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.bin");
        fs::write(&path, b"xx").unwrap();
        assert!(matches!(
            RandomForest::load(&path),
            Err(RfError::ModelEncoding { .. })
        ));
    }
}
