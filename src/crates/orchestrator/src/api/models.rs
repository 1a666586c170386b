//! Request and response DTOs
//!
//! Row structs store JSON columns as TEXT; the response DTOs decode them so
//! clients see structured values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{decode_json, AgentRow, ExecutionRow, ExecutionStepRow, ToolRow, WorkflowRow};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// `?page=N&page_size=M` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        let page = self.page.max(1);
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        (page_size, (page - 1) * page_size)
    }
}

/// Generic paginated list envelope.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page.max(1),
            page_size: pagination.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

// Agents

#[derive(Debug, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instructions: String,
    pub llm_config: Value,
    #[serde(default)]
    pub output_schema: Option<Value>,
    #[serde(default)]
    pub tool_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub llm_config: Value,
    pub output_schema: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl AgentResponse {
    pub fn from_row(row: AgentRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            llm_config: serde_json::from_str(&row.llm_config)?,
            output_schema: decode_json(&row.output_schema)?,
            id: row.id,
            name: row.name,
            description: row.description,
            instructions: row.instructions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Tools

#[derive(Debug, Deserialize)]
pub struct ToolCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub function_schema: Value,
    pub implementation_ref: String,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub function_schema: Value,
    pub implementation_ref: String,
    pub config: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl ToolResponse {
    pub fn from_row(row: ToolRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            function_schema: serde_json::from_str(&row.function_schema)?,
            config: decode_json(&row.config)?,
            id: row.id,
            name: row.name,
            description: row.description,
            implementation_ref: row.implementation_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Workflows

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub state_schema: Option<Value>,
    pub is_template: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkflowResponse {
    pub fn from_row(row: WorkflowRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            state_schema: decode_json(&row.state_schema)?,
            id: row.id,
            name: row.name,
            description: row.description,
            is_template: row.is_template,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Executions

#[derive(Debug, Serialize)]
pub struct ExecutionStepResponse {
    pub id: String,
    pub node_id: String,
    pub status: String,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl ExecutionStepResponse {
    pub fn from_row(row: ExecutionStepRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            input_data: decode_json(&row.input_data)?,
            output_data: decode_json(&row.output_data)?,
            id: row.id,
            node_id: row.node_id,
            status: row.status,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: String,
    pub workflow_id: String,
    pub thread_id: String,
    pub status: String,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub steps: Vec<ExecutionStepResponse>,
}

impl ExecutionResponse {
    pub fn from_rows(
        row: ExecutionRow,
        steps: Vec<ExecutionStepRow>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            input_data: decode_json(&row.input_data)?,
            output_data: decode_json(&row.output_data)?,
            id: row.id,
            workflow_id: row.workflow_id,
            thread_id: row.thread_id,
            status: row.status,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            steps: steps
                .into_iter()
                .map(ExecutionStepResponse::from_row)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Lightweight polling response.
#[derive(Debug, Serialize)]
pub struct ExecutionStatusResponse {
    pub id: String,
    pub status: String,
    pub progress: Value,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamped() {
        let pagination = Pagination {
            page: 3,
            page_size: 500,
        };
        let (limit, offset) = pagination.clamped();
        assert_eq!(limit, 100);
        assert_eq!(offset, 200);

        let (limit, offset) = Pagination::default().clamped();
        assert_eq!(limit, 20);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_pagination_floor() {
        let pagination = Pagination {
            page: 0,
            page_size: 0,
        };
        let (limit, offset) = pagination.clamped();
        assert_eq!(limit, 1);
        assert_eq!(offset, 0);
    }
}
