//! Tool rows

use serde::Serialize;
use sqlx::FromRow;

/// Persisted tool definition. `name` is unique; it is the identifier the
/// models see.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ToolRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema describing the tool's arguments.
    pub function_schema: String,
    /// Implementation reference, e.g. `builtin:calculator` or
    /// `custom:my_tool`.
    pub implementation_ref: String,
    pub config: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
