//! In-memory checkpoint backend
//!
//! Keeps snapshots in a `HashMap` behind a `tokio::sync::RwLock`. Suitable
//! for tests and single-process runs where durability does not matter; the
//! orchestrator uses its SQLite backend in production.

use crate::checkpoint::StateSnapshot;
use crate::error::Result;
use crate::traits::Checkpointer;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Checkpointer that stores snapshots in process memory.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    // thread_id -> snapshots ordered by step_index
    threads: RwLock<HashMap<String, Vec<StateSnapshot>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots held for a thread. Test helper.
    pub async fn snapshot_count(&self, thread_id: &str) -> usize {
        self.threads
            .read()
            .await
            .get(thread_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, thread_id: &str, step_index: u64, state: &Value) -> Result<()> {
        let snapshot = StateSnapshot::new(thread_id, step_index, state.clone());
        let mut threads = self.threads.write().await;
        let snapshots = threads.entry(thread_id.to_string()).or_default();

        match snapshots.binary_search_by_key(&step_index, |s| s.step_index) {
            Ok(pos) => snapshots[pos] = snapshot,
            Err(pos) => snapshots.insert(pos, snapshot),
        }

        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<StateSnapshot>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|snapshots| snapshots.last().cloned()))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}
