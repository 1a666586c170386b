//! Agent CRUD handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{AgentCreate, AgentResponse, Paginated, Pagination, ToolResponse};
use crate::api::routes::AppState;
use crate::db::repositories::{AgentRepository, ToolRepository};

pub async fn create_agent(
    State(state): State<AppState>,
    Json(body): Json<AgentCreate>,
) -> ApiResult<(StatusCode, Json<AgentResponse>)> {
    let llm_config = serde_json::to_string(&body.llm_config)?;
    let output_schema = body
        .output_schema
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let agent = AgentRepository::create(
        &state.db,
        &body.name,
        body.description.as_deref(),
        &body.instructions,
        &llm_config,
        output_schema.as_deref(),
    )
    .await?;

    for tool_id in &body.tool_ids {
        ToolRepository::get_by_id(&state.db, tool_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Tool {}", tool_id)))?;
        AgentRepository::bind_tool(&state.db, &agent.id, tool_id).await?;
    }

    Ok((StatusCode::CREATED, Json(AgentResponse::from_row(agent)?)))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Paginated<AgentResponse>>> {
    let (limit, offset) = pagination.clamped();
    let rows = AgentRepository::list(&state.db, limit, offset).await?;
    let total = AgentRepository::count(&state.db).await?;
    let items = rows
        .into_iter()
        .map(AgentResponse::from_row)
        .collect::<Result<_, _>>()?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentResponse>> {
    let agent = AgentRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Agent {}", id)))?;
    Ok(Json(AgentResponse::from_row(agent)?))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AgentCreate>,
) -> ApiResult<Json<AgentResponse>> {
    let llm_config = serde_json::to_string(&body.llm_config)?;
    let output_schema = body
        .output_schema
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let agent = AgentRepository::update(
        &state.db,
        &id,
        &body.name,
        body.description.as_deref(),
        &body.instructions,
        &llm_config,
        output_schema.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Agent {}", id)))?;
    Ok(Json(AgentResponse::from_row(agent)?))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if AgentRepository::delete(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Agent {}", id)))
    }
}

#[derive(Debug, Deserialize)]
pub struct BindToolRequest {
    pub tool_id: String,
}

pub async fn list_agent_tools(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ToolResponse>>> {
    AgentRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Agent {}", id)))?;
    let tools = AgentRepository::tools_for(&state.db, &id)
        .await?
        .into_iter()
        .map(ToolResponse::from_row)
        .collect::<Result<_, _>>()?;
    Ok(Json(tools))
}

pub async fn bind_agent_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BindToolRequest>,
) -> ApiResult<StatusCode> {
    AgentRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Agent {}", id)))?;
    ToolRepository::get_by_id(&state.db, &body.tool_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Tool {}", body.tool_id)))?;
    AgentRepository::bind_tool(&state.db, &id, &body.tool_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unbind_agent_tool(
    State(state): State<AppState>,
    Path((id, tool_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if AgentRepository::unbind_tool(&state.db, &id, &tool_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "binding {} -> {}",
            id, tool_id
        )))
    }
}
