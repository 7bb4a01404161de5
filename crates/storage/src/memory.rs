//! In-memory history backend, for tests and ephemeral sessions.

use std::sync::Arc;

use async_trait::async_trait;
use cropwatch_core::PredictionRecord;
use tokio::sync::Mutex;

use super::{HistoryStore, Result};

/// History kept in process memory. Clones share the same list.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    records: Arc<Mutex<Vec<PredictionRecord>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves performed so far.
    pub async fn writes(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Result<Vec<PredictionRecord>> {
        Ok(self.records.lock().await.clone())
    }

    async fn save(&mut self, records: &[PredictionRecord]) -> Result<()> {
        *self.records.lock().await = records.to_vec();
        *self.writes.lock().await += 1;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        self.records.lock().await.clear();
        Ok(())
    }
}
