//! Repositories over the entity store

pub mod agent_repo;
pub mod checkpoint_repo;
pub mod execution_repo;
pub mod tool_repo;
pub mod workflow_repo;

pub use agent_repo::AgentRepository;
pub use checkpoint_repo::CheckpointRepository;
pub use execution_repo::ExecutionRepository;
pub use tool_repo::ToolRepository;
pub use workflow_repo::WorkflowRepository;

use chrono::Utc;

/// Current timestamp in the TEXT format every table uses.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Fresh string primary key.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
