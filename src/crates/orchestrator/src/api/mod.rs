//! HTTP API
//!
//! axum router, `X-API-Key` middleware, request/response DTOs, and the
//! handler modules. SSE framing for the streaming endpoint lives here; the
//! executor only ever writes typed events to its channel.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_router, AppState};
