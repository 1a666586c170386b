//! Provider configuration structures.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

/// The `llm_config` block stored on an agent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider key: `openai`, `anthropic`, or `google`.
    pub provider: String,

    /// Model identifier passed through to the provider.
    pub model: String,

    /// Optional completion token cap.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Connection settings for one remote provider client.
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl RemoteClientConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: default_timeout(),
        }
    }

    /// Read the API key from an environment variable.
    pub fn from_env(env_var: &str, base_url: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("environment variable {}", env_var)))?;
        Ok(Self::new(api_key, base_url))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
