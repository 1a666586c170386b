//! Execution and execution-step rows

use serde::Serialize;
use sqlx::FromRow;

use agentgraph_core::ExecutionStatus;

use crate::db::error::DatabaseError;

/// A single run of a workflow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExecutionRow {
    pub id: String,
    pub workflow_id: String,
    /// Stable across resume; ties the run to its checkpoints.
    pub thread_id: String,
    pub status: String,
    pub input_data: Option<String>,
    pub output_data: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl ExecutionRow {
    pub fn status(&self) -> Result<ExecutionStatus, DatabaseError> {
        self.status
            .parse()
            .map_err(|e: String| DatabaseError::Corrupt(e))
    }
}

/// One node invocation inside an execution.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExecutionStepRow {
    pub id: String,
    pub execution_id: String,
    pub node_id: String,
    pub status: String,
    pub input_data: Option<String>,
    pub output_data: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl ExecutionStepRow {
    pub fn status(&self) -> Result<ExecutionStatus, DatabaseError> {
        self.status
            .parse()
            .map_err(|e: String| DatabaseError::Corrupt(e))
    }
}
