//! Request and response types for chat completion

use crate::error::{GraphError, Result};
use crate::messages::{Message, ToolCallRequest};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition handed to a provider so the model can request calls.
/// `parameters` is a JSON Schema describing the arguments object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One chat-completion call.
///
/// Temperature defaults to `0` so workflow runs stay as deterministic as the
/// provider allows. `tools` and `output_schema` are mutually exclusive; the
/// builder methods enforce it so the conflict never reaches a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolSchema>,
    pub output_schema: Option<Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools: Vec::new(),
            output_schema: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Result<Self> {
        if self.output_schema.is_some() {
            return Err(GraphError::Provider(
                "tools and output_schema are mutually exclusive".to_string(),
            ));
        }
        self.tools = tools;
        Ok(self)
    }

    pub fn with_output_schema(mut self, schema: Value) -> Result<Self> {
        if !self.tools.is_empty() {
            return Err(GraphError::Provider(
                "tools and output_schema are mutually exclusive".to_string(),
            ));
        }
        self.output_schema = Some(schema);
        Ok(self)
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A completed provider response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Completion {
    /// Plain text completion with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }
}

/// Stream of content chunks from `stream_complete`.
pub type ContentStream = BoxStream<'static, Result<String>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_temperature_defaults_to_zero() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")]);
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn test_tools_and_output_schema_are_exclusive() {
        let schema = json!({"type": "object"});
        let tool = ToolSchema {
            name: "calc".to_string(),
            description: "math".to_string(),
            parameters: json!({"type": "object"}),
        };

        let with_schema = CompletionRequest::new("m", vec![])
            .with_output_schema(schema.clone())
            .unwrap();
        assert!(with_schema.with_tools(vec![tool.clone()]).is_err());

        let with_tools = CompletionRequest::new("m", vec![])
            .with_tools(vec![tool])
            .unwrap();
        assert!(with_tools.with_output_schema(schema).is_err());
    }
}
