//! LLM provider adapters for agentgraph
//!
//! Implements the core [`ChatProvider`](agentgraph_core::llm::ChatProvider)
//! trait for the hosted providers: OpenAI, Anthropic, and Google Gemini.
//! Each adapter owns the translation between the canonical message turns and
//! its provider's wire shapes; the [`ProviderFactory`](factory::ProviderFactory)
//! builds clients from an agent's `llm_config` with credentials taken from
//! the environment.

pub mod config;
pub mod error;
pub mod factory;
pub mod remote;

pub use config::{ProviderConfig, RemoteClientConfig};
pub use error::{LlmError, Result};
pub use factory::ProviderFactory;
pub use remote::{AnthropicClient, GeminiClient, OpenAiClient};
