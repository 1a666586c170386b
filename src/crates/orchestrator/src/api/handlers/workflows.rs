//! Workflow CRUD handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{Paginated, Pagination, WorkflowResponse};
use crate::api::routes::AppState;
use crate::db::models::{WorkflowEdgeRow, WorkflowNodeRow};
use crate::db::repositories::WorkflowRepository;
use crate::services::workflow_service::WorkflowCreate;

pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<WorkflowCreate>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    let workflow = state.workflows.create(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(WorkflowResponse::from_row(workflow)?),
    ))
}

pub async fn list_workflows(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Paginated<WorkflowResponse>>> {
    let (limit, offset) = pagination.clamped();
    let rows = WorkflowRepository::list(&state.db, limit, offset).await?;
    let total = WorkflowRepository::count(&state.db).await?;
    let items = rows
        .into_iter()
        .map(WorkflowResponse::from_row)
        .collect::<Result<_, _>>()?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow = WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;
    Ok(Json(WorkflowResponse::from_row(workflow)?))
}

pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if WorkflowRepository::delete(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Workflow {}", id)))
    }
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn clone_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CloneRequest>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    let original = WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;
    let name = body
        .name
        .unwrap_or_else(|| format!("{} (copy)", original.name));

    let clone = WorkflowRepository::clone_workflow(&state.db, &id, &name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;
    Ok((StatusCode::CREATED, Json(WorkflowResponse::from_row(clone)?)))
}

pub async fn list_nodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WorkflowNodeRow>>> {
    WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;
    Ok(Json(WorkflowRepository::list_nodes(&state.db, &id).await?))
}

/// Raw node sub-resource body; mirrors the row columns. Compile-time
/// validation happens when the workflow next executes.
#[derive(Debug, Deserialize)]
pub struct NodeRowCreate {
    pub node_id: String,
    pub node_type: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub router_config: Option<serde_json::Value>,
    #[serde(default)]
    pub parallel_nodes: Option<Vec<String>>,
    #[serde(default)]
    pub subgraph_workflow_id: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

pub async fn add_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NodeRowCreate>,
) -> ApiResult<(StatusCode, Json<WorkflowNodeRow>)> {
    WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;

    let router_config = body
        .router_config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let parallel_nodes = body
        .parallel_nodes
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let config = body.config.as_ref().map(serde_json::to_string).transpose()?;

    let node = WorkflowRepository::add_node(
        &state.db,
        &id,
        &body.node_id,
        &body.node_type,
        body.agent_id.as_deref(),
        router_config.as_deref(),
        parallel_nodes.as_deref(),
        body.subgraph_workflow_id.as_deref(),
        config.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Path((id, node_row_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if WorkflowRepository::delete_node(&state.db, &id, &node_row_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Node {}", node_row_id)))
    }
}

pub async fn list_edges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WorkflowEdgeRow>>> {
    WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;
    Ok(Json(WorkflowRepository::list_edges(&state.db, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct EdgeRowCreate {
    pub source_node: String,
    pub target_node: String,
    #[serde(default)]
    pub condition: Option<String>,
}

pub async fn add_edge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EdgeRowCreate>,
) -> ApiResult<(StatusCode, Json<WorkflowEdgeRow>)> {
    WorkflowRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;

    // Conditions are checked here the same way workflow create checks them.
    if let Some(condition) = &body.condition {
        agentgraph_core::expr::parse(condition)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
    }

    let edge = WorkflowRepository::add_edge(
        &state.db,
        &id,
        &body.source_node,
        &body.target_node,
        body.condition.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn delete_edge(
    State(state): State<AppState>,
    Path((id, edge_row_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if WorkflowRepository::delete_edge(&state.db, &id, &edge_row_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Edge {}", edge_row_id)))
    }
}
