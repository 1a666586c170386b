//! Health check

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::routes::AppState;

/// Unauthenticated liveness probe; reports database reachability.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
