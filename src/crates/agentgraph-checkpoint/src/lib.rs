//! Checkpoint persistence for agentgraph executions
//!
//! A checkpoint is a full serialized snapshot of a workflow's state, keyed by
//! the execution's `thread_id` and a monotonically increasing step index. The
//! scheduler saves one checkpoint after every state fold; `resume` restores
//! the latest snapshot for a thread and continues from there.
//!
//! This crate defines the [`Checkpointer`] trait plus an in-memory reference
//! implementation. Database-backed implementations live with their stores
//! (the orchestrator ships a SQLite one) so that the snapshot write can share
//! a transaction with the execution-step write.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod traits;

pub use checkpoint::StateSnapshot;
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointer;
pub use traits::Checkpointer;
