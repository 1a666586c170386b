//! Provider factory.
//!
//! Builds [`ChatProvider`] handles from an agent's `llm_config`. Credentials
//! come from the process environment at construction time; the factory is
//! created once at startup and shared read-only afterwards. A provider whose
//! key is absent stays unconfigured and fails resolution with a clear error
//! instead of failing at the first request.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use agentgraph_core::llm::ChatProvider;

use crate::config::{ProviderConfig, RemoteClientConfig};
use crate::error::{LlmError, Result};
use crate::remote::{anthropic, gemini, openai, AnthropicClient, GeminiClient, OpenAiClient};

/// Environment variables holding provider credentials.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// Registry of configured provider clients, keyed by provider name.
pub struct ProviderFactory {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderFactory {
    /// Build clients for every provider with a credential in the
    /// environment.
    pub fn from_env() -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();

        if let Ok(config) = RemoteClientConfig::from_env(OPENAI_API_KEY, openai::DEFAULT_BASE_URL)
        {
            providers.insert(
                "openai".to_string(),
                Arc::new(OpenAiClient::new(config)?),
            );
        }
        if let Ok(config) =
            RemoteClientConfig::from_env(ANTHROPIC_API_KEY, anthropic::DEFAULT_BASE_URL)
        {
            providers.insert(
                "anthropic".to_string(),
                Arc::new(AnthropicClient::new(config)?),
            );
        }
        if let Ok(config) = RemoteClientConfig::from_env(GOOGLE_API_KEY, gemini::DEFAULT_BASE_URL)
        {
            providers.insert(
                "google".to_string(),
                Arc::new(GeminiClient::new(config)?),
            );
        }

        let mut names: Vec<&str> = providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        info!(providers = ?names, "configured LLM providers");

        Ok(Self { providers })
    }

    /// Factory with an explicit provider set; used by tests and embedders.
    pub fn with_providers(providers: HashMap<String, Arc<dyn ChatProvider>>) -> Self {
        Self { providers }
    }

    /// Resolve the provider named by an agent's `llm_config`.
    pub fn get(&self, config: &ProviderConfig) -> Result<Arc<dyn ChatProvider>> {
        self.providers
            .get(config.provider.as_str())
            .cloned()
            .ok_or_else(|| {
                LlmError::UnknownProvider(format!(
                    "'{}' is not configured (configured: {})",
                    config.provider,
                    self.configured_names().join(", ")
                ))
            })
    }

    pub fn configured_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
