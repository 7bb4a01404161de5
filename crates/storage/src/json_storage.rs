//! JSON file storage implementation.
//!
//! Keeps the whole history as one pretty-printed JSON array. Writes go to a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves the previous history intact.

use std::path::{Path, PathBuf};
use cropwatch_core::PredictionRecord;
use super::{HistoryStore, Result};
use tokio::fs;
use tracing::debug;

/// File-based JSON history backend.
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    /// Create a store backed by `path`. The parent directory is created if
    /// needed; the file itself is only written on the first save.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    /// Location of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn load(&self) -> Result<Vec<PredictionRecord>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&mut self, records: &[PredictionRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Wrote {} history records to {}", records.len(), self.path.display());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        fs::remove_file(&self.path).await.or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
        })?;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use cropwatch_core::{Prediction, Severity};

    fn record(pest: &str) -> PredictionRecord {
        PredictionRecord::new(
            format!("{}.jpg", pest),
            Prediction {
                pest_name: pest.to_string(),
                confidence: 88.0,
                treatment: "Neem oil".to_string(),
                severity: Severity::Medium,
                class_probabilities: None,
                inference_time: Some(42.0),
                model_version: Some("1.0".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json")).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = JsonHistoryStore::new(&path).await.unwrap();

        let records = vec![record("aphids"), record("mites")];
        store.save(&records).await.unwrap();

        let reopened = JsonHistoryStore::new(&path).await.unwrap();
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded, records);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[{ broken").unwrap();

        let store = JsonHistoryStore::new(&path).await.unwrap();
        assert!(matches!(store.load().await, Err(StorageError::Json(_))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonHistoryStore::new(dir.path().join("history.json")).await.unwrap();

        store.save(&[record("beetle")]).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
