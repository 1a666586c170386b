//! Error types for provider adapters.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider rejected the request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider returned a response we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested provider is not configured or unknown.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Any other provider-side failure.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl LlmError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Http(_) | LlmError::RateLimited(_))
    }

    /// Whether this failure is a credential problem.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::Authentication(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Map an error HTTP status to the right variant.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Authentication(body),
            429 => LlmError::RateLimited(body),
            400 | 422 => LlmError::InvalidRequest(body),
            _ => LlmError::Provider(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

/// Adapters surface through the core error type; every provider failure
/// becomes a node failure at the executor.
impl From<LlmError> for agentgraph_core::GraphError {
    fn from(err: LlmError) -> Self {
        agentgraph_core::GraphError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let auth = LlmError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(auth.is_auth_error());

        let limited =
            LlmError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(limited.is_retryable());

        let other =
            LlmError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops".into());
        assert!(!other.is_retryable());
    }
}
