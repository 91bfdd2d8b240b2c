//! JSON files on disk, one per stage.

use super::ArtifactStore;
use crate::core::Artifact;
use crate::errors::ScreenflowError;
use crate::utils::validate_stage_name;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each artifact as `<state_dir>/artifacts/<stage>.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Creates a store under `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            root: state_dir.as_ref().join("artifacts"),
        }
    }

    /// Returns the directory holding artifact files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path for a stage.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenflowError::InvalidStageName`] for names that are not
    /// safe file names.
    pub fn path_for(&self, stage: &str) -> Result<PathBuf, ScreenflowError> {
        validate_stage_name(stage)?;
        Ok(self.root.join(format!("{stage}.json")))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn read(&self, stage: &str) -> Result<Artifact, ScreenflowError> {
        let path = self.path_for(stage)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ScreenflowError::artifact_not_found(stage));
            }
            Err(err) => return Err(err.into()),
        };
        let mut artifact: Artifact = serde_json::from_slice(&bytes)?;
        artifact.stage = stage.to_string();
        Ok(artifact)
    }

    async fn write(&self, artifact: &Artifact) -> Result<(), ScreenflowError> {
        let path = self.path_for(&artifact.stage)?;
        let bytes = serde_json::to_vec_pretty(artifact)?;
        write_atomic(&path, &bytes).await?;
        debug!(stage = %artifact.stage, records = artifact.len(), path = %path.display(), "Artifact written");
        Ok(())
    }

    async fn exists(&self, stage: &str) -> Result<bool, ScreenflowError> {
        let path = self.path_for(stage)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn remove(&self, stage: &str) -> Result<bool, ScreenflowError> {
        let path = self.path_for(stage)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Replaces `path` with `bytes` so readers see either the old or the new
/// content, never a prefix.
///
/// The bytes go to a uniquely named hidden sibling first and are renamed
/// over the target.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(err) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err);
    }
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use pretty_assertions::assert_eq;

    fn sample() -> Artifact {
        Artifact::new(
            "relative_strengths",
            vec![
                Record::for_symbol("NVDA").with("RS", 99),
                Record::for_symbol("SMCI").with("RS", 97),
            ],
        )
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());

        store.write(&sample()).await.unwrap();
        assert!(store.exists("relative_strengths").await.unwrap());
        assert_eq!(store.read("relative_strengths").await.unwrap(), sample());
        assert!(dir.path().join("artifacts/relative_strengths.json").is_file());
    }

    #[tokio::test]
    async fn test_repeated_write_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let path = store.path_for("relative_strengths").unwrap();

        store.write(&sample()).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.write(&sample()).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.read("relative_strengths").await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.write(&sample()).await.unwrap();
        store.write(&sample()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["relative_strengths.json".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());

        assert!(store.read("trend").await.unwrap_err().is_not_found());
        assert!(!store.exists("trend").await.unwrap());
        assert!(!store.remove("trend").await.unwrap());

        store.write(&Artifact::empty("trend")).await.unwrap();
        assert!(store.remove("trend").await.unwrap());
        assert!(!store.exists("trend").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_like_stage_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());

        let err = store.write(&Artifact::empty("../escape")).await.unwrap_err();
        assert!(matches!(err, ScreenflowError::InvalidStageName { .. }));
        assert!(matches!(
            store.read(".hidden").await.unwrap_err(),
            ScreenflowError::InvalidStageName { .. }
        ));
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let path = store.path_for("trend").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ truncated").unwrap();

        assert!(matches!(
            store.read("trend").await.unwrap_err(),
            ScreenflowError::Serialization(_)
        ));
    }
}
