//! OpenAI chat-completions client.
//!
//! Canonical turns map directly onto the chat-completions roles; tool calls
//! ride on the assistant message and tool results are `role: "tool"` turns
//! keyed by `tool_call_id`. Structured output binds the schema through
//! `response_format: json_schema`.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentgraph_core::error::Result as GraphResult;
use agentgraph_core::llm::{
    ChatProvider, Completion, CompletionRequest, ContentStream, FinishReason, Usage,
};
use agentgraph_core::messages::{Message, ToolCallRequest};

use crate::config::RemoteClientConfig;
use crate::error::LlmError;
use crate::remote::sse_data_lines;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteClientConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: RemoteClientConfig) -> crate::error::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|message| match message {
                Message::System { content } => WireMessage {
                    role: "system",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::User { content } => WireMessage {
                    role: "user",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::Assistant {
                    content,
                    tool_calls,
                } => WireMessage {
                    role: "assistant",
                    content: if content.is_empty() {
                        None
                    } else {
                        Some(content.clone())
                    },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            tool_calls
                                .iter()
                                .map(|call| WireToolCall {
                                    id: call.id.clone(),
                                    call_type: "function".to_string(),
                                    function: WireFunctionCall {
                                        name: call.name.clone(),
                                        arguments: call.arguments.clone(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                },
                Message::Tool {
                    tool_call_id,
                    content,
                    ..
                } => WireMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id.clone()),
                },
            })
            .collect()
    }

    fn build_body(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        WireRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .tools
                        .iter()
                        .map(|tool| WireTool {
                            tool_type: "function".to_string(),
                            function: WireFunctionDef {
                                name: tool.name.clone(),
                                description: tool.description.clone(),
                                parameters: tool.parameters.clone(),
                            },
                        })
                        .collect(),
                )
            },
            response_format: request.output_schema.as_ref().map(|schema| WireResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: WireJsonSchema {
                    name: "output".to_string(),
                    schema: schema.clone(),
                },
            }),
            stream,
        }
    }

    async fn post(&self, body: &WireRequest) -> crate::error::Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> GraphResult<Completion> {
        let body = self.build_body(&request, false);
        let response = self.post(&body).await?;
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Stop,
        };

        let usage = wire
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
            usage,
        })
    }

    async fn stream_complete(&self, request: CompletionRequest) -> GraphResult<ContentStream> {
        let body = self.build_body(&request, true);
        let response = self.post(&body).await?;
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(LlmError::from)?;
                let text = String::from_utf8_lossy(&chunk);
                for data in sse_data_lines(&text) {
                    if data == "[DONE]" {
                        return;
                    }
                    let delta: WireStreamChunk = serde_json::from_str(&data)
                        .map_err(LlmError::from)?;
                    if let Some(content) = delta
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                    {
                        yield content;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

// OpenAI wire types.

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: WireJsonSchema,
}

#[derive(Debug, Serialize)]
struct WireJsonSchema {
    name: String,
    schema: Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
}

#[derive(Debug, Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("be helpful"),
            Message::user("hi"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "calculator".to_string(),
                    arguments: "{\"expression\":\"2+2\"}".to_string(),
                }],
            ),
            Message::tool("call_1", "calculator", "4"),
        ];

        let wire = OpenAiClient::convert_messages(&messages);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[2].role, "assistant");
        assert!(wire[2].content.is_none());
        assert_eq!(wire[2].tool_calls.as_ref().unwrap()[0].function.name, "calculator");
        assert_eq!(wire[3].role, "tool");
        assert_eq!(wire[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_structured_output_binds_response_format() {
        let client = OpenAiClient::new(RemoteClientConfig::new("k", DEFAULT_BASE_URL)).unwrap();
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")])
            .with_output_schema(serde_json::json!({"type": "object"}))
            .unwrap();
        let body = client.build_body(&request, false);
        assert!(body.tools.is_none());
        assert_eq!(body.response_format.unwrap().format_type, "json_schema");
    }
}
