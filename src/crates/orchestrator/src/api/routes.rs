//! API route definitions

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::config::Settings;
use crate::db::DatabasePool;
use crate::services::{ExecutionService, WorkflowService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub settings: Arc<Settings>,
    pub executions: ExecutionService,
    pub workflows: WorkflowService,
}

/// Build the complete API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health::health))
        // Agents
        .route(
            "/api/v1/agents",
            post(handlers::agents::create_agent).get(handlers::agents::list_agents),
        )
        .route(
            "/api/v1/agents/:id",
            get(handlers::agents::get_agent)
                .put(handlers::agents::update_agent)
                .delete(handlers::agents::delete_agent),
        )
        .route(
            "/api/v1/agents/:id/tools",
            get(handlers::agents::list_agent_tools).post(handlers::agents::bind_agent_tool),
        )
        .route(
            "/api/v1/agents/:id/tools/:tool_id",
            delete(handlers::agents::unbind_agent_tool),
        )
        // Tools
        .route(
            "/api/v1/tools",
            post(handlers::tools::create_tool).get(handlers::tools::list_tools),
        )
        .route(
            "/api/v1/tools/:id",
            get(handlers::tools::get_tool)
                .put(handlers::tools::update_tool)
                .delete(handlers::tools::delete_tool),
        )
        // Workflows
        .route(
            "/api/v1/workflows",
            post(handlers::workflows::create_workflow).get(handlers::workflows::list_workflows),
        )
        .route(
            "/api/v1/workflows/:id",
            get(handlers::workflows::get_workflow).delete(handlers::workflows::delete_workflow),
        )
        .route(
            "/api/v1/workflows/:id/clone",
            post(handlers::workflows::clone_workflow),
        )
        .route(
            "/api/v1/workflows/:id/nodes",
            get(handlers::workflows::list_nodes).post(handlers::workflows::add_node),
        )
        .route(
            "/api/v1/workflows/:id/nodes/:node_id",
            delete(handlers::workflows::delete_node),
        )
        .route(
            "/api/v1/workflows/:id/edges",
            get(handlers::workflows::list_edges).post(handlers::workflows::add_edge),
        )
        .route(
            "/api/v1/workflows/:id/edges/:edge_id",
            delete(handlers::workflows::delete_edge),
        )
        // Executions
        .route(
            "/api/v1/executions",
            post(handlers::executions::create_execution)
                .get(handlers::executions::list_executions),
        )
        .route(
            "/api/v1/executions/stream",
            post(handlers::executions::create_execution_stream),
        )
        .route(
            "/api/v1/executions/:id",
            get(handlers::executions::get_execution)
                .delete(handlers::executions::delete_execution),
        )
        .route(
            "/api/v1/executions/:id/status",
            get(handlers::executions::get_execution_status),
        )
        .route(
            "/api/v1/executions/:id/steps",
            get(handlers::executions::list_execution_steps),
        )
        .route(
            "/api/v1/executions/:id/cancel",
            post(handlers::executions::cancel_execution),
        )
        .route(
            "/api/v1/executions/:id/resume",
            post(handlers::executions::resume_execution),
        )
        .route(
            "/api/v1/executions/:id/restart",
            post(handlers::executions::restart_execution),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::api::middleware::require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
