//! Error types for checkpoint storage backends

use thiserror::Error;

/// Errors that can occur while saving or loading checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Snapshot could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backend has not been initialized with `setup()`.
    #[error("Checkpointer not initialized: {0}")]
    NotInitialized(String),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}
