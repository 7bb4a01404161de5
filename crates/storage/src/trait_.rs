//! Storage trait abstraction.

use async_trait::async_trait;
use cropwatch_core::PredictionRecord;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable home of the prediction history.
///
/// The history is read once when a view mounts and rewritten in full on
/// every change, so backends only deal in whole lists (most-recent-first).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the stored history. A store that was never written is empty.
    async fn load(&self) -> Result<Vec<PredictionRecord>>;

    /// Replace the stored history.
    async fn save(&mut self, records: &[PredictionRecord]) -> Result<()>;

    /// Remove the stored history.
    async fn clear(&mut self) -> Result<()>;
}
