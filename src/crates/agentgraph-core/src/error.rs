//! Error types for graph compilation and execution
//!
//! All errors implement `std::error::Error` via `thiserror`. The taxonomy
//! mirrors how failures propagate at runtime: tool and expression errors are
//! recovered locally and never appear here, while provider failures and
//! unknown node exceptions surface as `NodeExecution` and fail the execution.

use thiserror::Error;
use uuid::Uuid;

use crate::state::StateError;
use crate::tool::ToolError;

/// Errors produced by graph validation, compilation, and execution.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Workflow definition violates a structural invariant.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lowering a definition into a plan failed.
    #[error("Workflow compilation failed for {workflow_id}: {message}")]
    Compilation { workflow_id: Uuid, message: String },

    /// A referenced entity is missing from the store.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A node operator failed at runtime.
    #[error("Node '{node}' failed: {error}")]
    NodeExecution { node: String, error: String },

    /// General execution failure outside a specific node.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An LLM provider call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool lookup or invocation failed during compilation or validation.
    /// Runtime tool failures inside the agent loop are captured as tool
    /// turns instead.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// State reducer fold failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Snapshot persistence failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] agentgraph_checkpoint::CheckpointError),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A node exceeded its configured wall-clock budget.
    #[error("node timeout")]
    Timeout { node: String, seconds: u64 },

    /// The execution observed its cancel flag and stopped cooperatively.
    #[error("Execution cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Whether this error represents cooperative cancellation rather than a
    /// genuine failure. Cancellation is a first-class terminal state, not an
    /// error condition, and callers map it to the `cancelled` status.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, GraphError::Cancelled)
    }
}
