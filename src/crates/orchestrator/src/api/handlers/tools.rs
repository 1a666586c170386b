//! Tool CRUD handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{Paginated, Pagination, ToolCreate, ToolResponse};
use crate::api::routes::AppState;
use crate::db::repositories::ToolRepository;

pub async fn create_tool(
    State(state): State<AppState>,
    Json(body): Json<ToolCreate>,
) -> ApiResult<(StatusCode, Json<ToolResponse>)> {
    let function_schema = serde_json::to_string(&body.function_schema)?;
    let config = body.config.as_ref().map(serde_json::to_string).transpose()?;

    let tool = ToolRepository::create(
        &state.db,
        &body.name,
        body.description.as_deref(),
        &function_schema,
        &body.implementation_ref,
        config.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ToolResponse::from_row(tool)?)))
}

pub async fn list_tools(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Paginated<ToolResponse>>> {
    let (limit, offset) = pagination.clamped();
    let rows = ToolRepository::list(&state.db, limit, offset).await?;
    let total = ToolRepository::count(&state.db).await?;
    let items = rows
        .into_iter()
        .map(ToolResponse::from_row)
        .collect::<Result<_, _>>()?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}

pub async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ToolResponse>> {
    let tool = ToolRepository::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Tool {}", id)))?;
    Ok(Json(ToolResponse::from_row(tool)?))
}

pub async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ToolCreate>,
) -> ApiResult<Json<ToolResponse>> {
    let function_schema = serde_json::to_string(&body.function_schema)?;
    let config = body.config.as_ref().map(serde_json::to_string).transpose()?;

    let tool = ToolRepository::update(
        &state.db,
        &id,
        &body.name,
        body.description.as_deref(),
        &function_schema,
        &body.implementation_ref,
        config.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Tool {}", id)))?;
    Ok(Json(ToolResponse::from_row(tool)?))
}

pub async fn delete_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if ToolRepository::delete(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Tool {}", id)))
    }
}
