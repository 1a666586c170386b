//! Database models
//!
//! Row structs for the entity store. Timestamp fields are RFC3339 strings
//! (TEXT in SQLite) and JSON configuration maps are TEXT, decoded where
//! they are consumed.

pub mod agent;
pub mod execution;
pub mod tool;
pub mod workflow;

pub use agent::{AgentRow, AgentToolRow};
pub use execution::{ExecutionRow, ExecutionStepRow};
pub use tool::ToolRow;
pub use workflow::{WorkflowEdgeRow, WorkflowNodeRow, WorkflowRow};

/// Decode an optional TEXT column holding JSON.
pub(crate) fn decode_json(
    column: &Option<String>,
) -> Result<Option<serde_json::Value>, serde_json::Error> {
    column
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
}
