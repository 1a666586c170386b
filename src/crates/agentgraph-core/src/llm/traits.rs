//! The provider capability trait

use crate::error::Result;
use crate::llm::request::{Completion, CompletionRequest, ContentStream};
use async_trait::async_trait;

/// A chat-completion capability: given messages plus optional tool schemas or
/// an output schema, produce content, possibly with tool-call requests, with
/// token accounting.
///
/// Implementations live in the `llm` crate (OpenAI, Anthropic, Gemini) and in
/// test code as deterministic stubs. Handles are shared as
/// `Arc<dyn ChatProvider>` and must be safe to call concurrently; adapters
/// are constructed once at startup and treated as read-only afterwards.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion call to the model.
    ///
    /// Errors map to [`GraphError::Provider`](crate::error::GraphError) and
    /// fail the calling node; the agent loop does not retry.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Stream the completion's content chunks. Tool calls and usage are not
    /// reported on this path.
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ContentStream>;

    /// Short provider identifier for logs (`openai`, `anthropic`, ...).
    fn provider_name(&self) -> &str;
}

impl std::fmt::Debug for dyn ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("dyn ChatProvider")
            .field(&self.provider_name())
            .finish()
    }
}
