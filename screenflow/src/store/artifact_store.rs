//! The artifact store seam and its in-memory implementation.

use crate::core::Artifact;
use crate::errors::ScreenflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Persists and loads stage artifacts by stage name.
///
/// `write` replaces the whole artifact. Calling it repeatedly for the same
/// stage is how fetch stages checkpoint, so every call must leave a complete
/// artifact readable; readers never observe a partial write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Reads the artifact persisted for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenflowError::ArtifactNotFound`] if nothing was persisted.
    async fn read(&self, stage: &str) -> Result<Artifact, ScreenflowError>;

    /// Persists `artifact` under `artifact.stage`, replacing any prior version.
    async fn write(&self, artifact: &Artifact) -> Result<(), ScreenflowError>;

    /// Returns true if an artifact is persisted for `stage`.
    async fn exists(&self, stage: &str) -> Result<bool, ScreenflowError>;

    /// Deletes the artifact for `stage`, returning whether one existed.
    async fn remove(&self, stage: &str) -> Result<bool, ScreenflowError>;
}

/// An artifact store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Artifact>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times `stage` has been written.
    #[must_use]
    pub fn write_count(&self, stage: &str) -> usize {
        self.writes.lock().get(stage).copied().unwrap_or(0)
    }

    /// Returns the names of all stored stages, sorted.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read(&self, stage: &str) -> Result<Artifact, ScreenflowError> {
        self.artifacts
            .lock()
            .get(stage)
            .cloned()
            .ok_or_else(|| ScreenflowError::artifact_not_found(stage))
    }

    async fn write(&self, artifact: &Artifact) -> Result<(), ScreenflowError> {
        self.artifacts
            .lock()
            .insert(artifact.stage.clone(), artifact.clone());
        *self.writes.lock().entry(artifact.stage.clone()).or_insert(0) += 1;
        Ok(())
    }

    async fn exists(&self, stage: &str) -> Result<bool, ScreenflowError> {
        Ok(self.artifacts.lock().contains_key(stage))
    }

    async fn remove(&self, stage: &str) -> Result<bool, ScreenflowError> {
        Ok(self.artifacts.lock().remove(stage).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = InMemoryArtifactStore::new();
        let err = store.read("trend").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists("trend").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_replaces() {
        let store = InMemoryArtifactStore::new();
        store
            .write(&Artifact::new("trend", vec![Record::for_symbol("A")]))
            .await
            .unwrap();
        store
            .write(&Artifact::new("trend", vec![Record::for_symbol("B")]))
            .await
            .unwrap();

        let artifact = store.read("trend").await.unwrap();
        assert_eq!(artifact.symbols(), vec!["B"]);
        assert_eq!(store.write_count("trend"), 2);
        assert_eq!(store.stages(), vec!["trend".to_string()]);
    }

    #[tokio::test]
    async fn test_same_artifact_written_twice_reads_identically() {
        let store = InMemoryArtifactStore::new();
        let artifact = Artifact::new("liquidity", vec![Record::for_symbol("X").with("Price", 2.5)]);

        store.write(&artifact).await.unwrap();
        let first = store.read("liquidity").await.unwrap();
        store.write(&artifact).await.unwrap();
        let second = store.read("liquidity").await.unwrap();

        assert_eq!(first, artifact);
        assert_eq!(second, artifact);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryArtifactStore::new();
        store.write(&Artifact::empty("a")).await.unwrap();
        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert!(!store.exists("a").await.unwrap());
    }
}
