//! Service layer
//!
//! Orchestrates repositories, the compiler, and the executor behind the API
//! handlers. Services return [`ServiceError`], which the API layer maps to
//! HTTP statuses.

pub mod execution_service;
pub mod workflow_service;

pub use execution_service::ExecutionService;
pub use workflow_service::WorkflowService;

use thiserror::Error;

use crate::db::DatabaseError;
use agentgraph_core::GraphError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Workflow compilation failed: {0}")]
    Compilation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Execution {execution_id} failed: {message}")]
    Execution {
        execution_id: String,
        message: String,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("serialization error: {}", err))
    }
}

impl From<GraphError> for ServiceError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Validation(message) => ServiceError::Validation(message),
            GraphError::Compilation { message, .. } => ServiceError::Compilation(message),
            GraphError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
            other => ServiceError::Internal(other.to_string()),
        }
    }
}
