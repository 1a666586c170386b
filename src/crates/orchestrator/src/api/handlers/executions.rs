//! Execution handlers
//!
//! The streaming endpoint frames executor events as Server-Sent Events:
//! `event:` carries the kind, `data:` a single-line JSON payload. The final
//! frame is `execution_complete` on success or `error` on failure; a
//! cancelled run just closes the stream.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use agentgraph_core::ExecutionStatus;

use crate::api::error::ApiResult;
use crate::api::models::{
    ExecutionResponse, ExecutionStatusResponse, ExecutionStepResponse, Paginated, Pagination,
};
use crate::api::routes::AppState;
use crate::services::execution_service::ExecutionCreate;

pub async fn create_execution(
    State(state): State<AppState>,
    Json(body): Json<ExecutionCreate>,
) -> ApiResult<(StatusCode, Json<ExecutionResponse>)> {
    let (execution, steps) = state.executions.execute(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExecutionResponse::from_rows(execution, steps)?),
    ))
}

pub async fn create_execution_stream(
    State(state): State<AppState>,
    Json(body): Json<ExecutionCreate>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>> {
    let (_execution, events) = state.executions.execute_stream(body).await?;

    let stream = UnboundedReceiverStream::new(events).map(|event| {
        Ok(Event::default()
            .event(event.kind())
            .data(event.payload().to_string()))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// Pagination fields are inlined rather than flattened: serde_urlencoded
// cannot drive numeric fields through #[serde(flatten)].
#[derive(Debug, Deserialize)]
pub struct ExecutionListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub workflow_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionListQuery>,
) -> ApiResult<Json<Paginated<ExecutionResponse>>> {
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(20),
    };
    let (limit, offset) = pagination.clamped();
    let (rows, total) = state
        .executions
        .list(query.workflow_id, query.status, limit, offset)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| ExecutionResponse::from_rows(row, Vec::new()))
        .collect::<Result<_, _>>()?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecutionResponse>> {
    let (execution, steps) = state.executions.get(&id).await?;
    Ok(Json(ExecutionResponse::from_rows(execution, steps)?))
}

pub async fn get_execution_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecutionStatusResponse>> {
    let (execution, progress) = state.executions.status(&id).await?;
    Ok(Json(ExecutionStatusResponse {
        id: execution.id,
        status: execution.status,
        progress,
        error_message: execution.error_message,
        started_at: execution.started_at,
        completed_at: execution.completed_at,
    }))
}

pub async fn list_execution_steps(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ExecutionStepResponse>>> {
    let (_, steps) = state.executions.get(&id).await?;
    let steps = steps
        .into_iter()
        .map(ExecutionStepResponse::from_row)
        .collect::<Result<_, _>>()?;
    Ok(Json(steps))
}

pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecutionResponse>> {
    let (execution, steps) = state.executions.cancel(&id).await?;
    Ok(Json(ExecutionResponse::from_rows(execution, steps)?))
}

pub async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.executions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ExecutionResponse>)> {
    let (execution, steps) = state.executions.resume(&id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExecutionResponse::from_rows(execution, steps)?),
    ))
}

pub async fn restart_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ExecutionResponse>)> {
    let (execution, steps) = state.executions.restart(&id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExecutionResponse::from_rows(execution, steps)?),
    ))
}
