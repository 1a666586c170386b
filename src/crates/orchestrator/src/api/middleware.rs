//! API key authentication middleware
//!
//! Every request must carry an `X-API-Key` header matching the configured
//! secret: missing header is 401, mismatch is 403. `/health` and the root
//! path are exempt.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;
use crate::api::routes::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const EXEMPT_PATHS: &[&str] = &["/", "/health"];

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        None => Err(ApiError::Unauthorized(
            "missing X-API-Key header".to_string(),
        )),
        Some(key) if key != state.settings.api_key => {
            Err(ApiError::Forbidden("invalid API key".to_string()))
        }
        Some(_) => Ok(next.run(request).await),
    }
}
