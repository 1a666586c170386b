//! Storage backend trait for checkpoint persistence

use crate::checkpoint::StateSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Storage backend for per-thread state snapshots.
///
/// Implementations must be `Send + Sync`; a single checkpointer handle is
/// shared by every execution in the process. Each `thread_id` owns an
/// independent snapshot history.
///
/// # Contract
///
/// - `save` is idempotent on `(thread_id, step_index)`: a repeated write
///   replaces the stored snapshot instead of failing.
/// - `load_latest` returns the snapshot with the highest `step_index` for
///   the thread, or `None` when the thread has never been checkpointed.
/// - `setup` prepares backend storage (creates tables, directories, ...) and
///   must be safe to call more than once.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Prepare the backend for use.
    async fn setup(&self) -> Result<()>;

    /// Persist a snapshot for `(thread_id, step_index)`.
    async fn save(&self, thread_id: &str, step_index: u64, state: &Value) -> Result<()>;

    /// Load the most recent snapshot for a thread.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<StateSnapshot>>;

    /// Drop all snapshots for a thread.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}
