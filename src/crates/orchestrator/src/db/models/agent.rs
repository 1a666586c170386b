//! Agent and agent-tool binding rows

use serde::Serialize;
use sqlx::FromRow;

/// Persisted agent configuration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    /// JSON: `{"provider": ..., "model": ..., "max_tokens": ...}`
    pub llm_config: String,
    /// JSON Schema for structured output, when set.
    pub output_schema: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Agent-tool many-to-many binding.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgentToolRow {
    pub agent_id: String,
    pub tool_id: String,
}
