//! Remote (hosted) provider clients.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Split one Server-Sent-Events chunk into its `data:` payloads. Shared by
/// the streaming paths of all three adapters.
pub(crate) fn sse_data_lines(chunk: &str) -> Vec<String> {
    chunk
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .filter(|data| !data.is_empty())
        .collect()
}
