//! Snapshot record shared by all checkpoint backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full state snapshot taken after one scheduler step.
///
/// Snapshots for a thread form a sequence ordered by `step_index`; the
/// scheduler only ever reads the latest one, but backends keep the history
/// for inspection. Writing the same `(thread_id, step_index)` twice replaces
/// the earlier snapshot, which makes retried saves idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Execution thread this snapshot belongs to.
    pub thread_id: String,

    /// Zero-based index of the scheduler step that produced this state.
    pub step_index: u64,

    /// The complete workflow state after the step's reducer fold.
    pub state: Value,

    /// When the snapshot was persisted.
    pub created_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Create a snapshot stamped with the current time.
    pub fn new(thread_id: impl Into<String>, step_index: u64, state: Value) -> Self {
        Self {
            thread_id: thread_id.into(),
            step_index,
            state,
            created_at: Utc::now(),
        }
    }
}
