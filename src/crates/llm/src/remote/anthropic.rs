//! Anthropic Messages API client.
//!
//! Anthropic takes the system prompt out-of-band and has no `tool` role:
//! tool results are rendered as `tool_result` content blocks inside a
//! synthesized user turn. Structured output is emulated the way LangChain
//! does it, by forcing a single synthetic tool whose input schema is the
//! requested output schema and returning the tool input as the content.

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

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Name of the synthetic tool used to emulate structured output.
const OUTPUT_TOOL: &str = "record_output";

/// Anthropic API client.
#[derive(Clone)]
pub struct AnthropicClient {
    config: RemoteClientConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: RemoteClientConfig) -> crate::error::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Split canonical turns into the out-of-band system prompt and the
    /// conversation messages.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
        let mut system: Option<String> = None;
        let mut wire: Vec<WireMessage> = Vec::new();

        for message in messages {
            match message {
                Message::System { content } => {
                    system = Some(match system {
                        Some(existing) => format!("{}\n\n{}", existing, content),
                        None => content.clone(),
                    });
                }
                Message::User { content } => wire.push(WireMessage {
                    role: "user",
                    content: vec![WireBlock::Text {
                        text: content.clone(),
                    }],
                }),
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut blocks = Vec::new();
                    if !content.is_empty() {
                        blocks.push(WireBlock::Text {
                            text: content.clone(),
                        });
                    }
                    for call in tool_calls {
                        blocks.push(WireBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: serde_json::from_str(&call.arguments)
                                .unwrap_or(Value::Object(Default::default())),
                        });
                    }
                    wire.push(WireMessage {
                        role: "assistant",
                        content: blocks,
                    });
                }
                Message::Tool {
                    tool_call_id,
                    content,
                    ..
                } => {
                    // Consecutive tool results collapse into one user turn.
                    let block = WireBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: content.clone(),
                    };
                    match wire.last_mut() {
                        Some(last) if last.role == "user" && last.is_tool_results() => {
                            last.content.push(block)
                        }
                        _ => wire.push(WireMessage {
                            role: "user",
                            content: vec![block],
                        }),
                    }
                }
            }
        }

        (system, wire)
    }

    fn build_body(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        let (system, messages) = Self::convert_messages(&request.messages);

        let mut tools: Vec<WireTool> = request
            .tools
            .iter()
            .map(|tool| WireTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect();

        // Structured output: one forced tool carrying the output schema.
        let tool_choice = if let Some(schema) = &request.output_schema {
            tools.push(WireTool {
                name: OUTPUT_TOOL.to_string(),
                description: "Record the final structured output.".to_string(),
                input_schema: schema.clone(),
            });
            Some(WireToolChoice {
                choice_type: "tool".to_string(),
                name: Some(OUTPUT_TOOL.to_string()),
            })
        } else {
            None
        };

        WireRequest {
            model: request.model.clone(),
            system,
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice,
            stream,
        }
    }

    async fn post(&self, body: &WireRequest) -> crate::error::Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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

    fn convert_response(wire: WireResponse, structured: bool) -> Completion {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in wire.content {
            match block {
                WireResponseBlock::Text { text } => content.push_str(&text),
                WireResponseBlock::ToolUse { id, name, input } => {
                    if structured && name == OUTPUT_TOOL {
                        // The forced output tool's input is the completion.
                        content = input.to_string();
                    } else {
                        tool_calls.push(ToolCallRequest {
                            id,
                            name,
                            arguments: input.to_string(),
                        });
                    }
                }
            }
        }

        let finish_reason = match wire.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("tool_use") if structured && tool_calls.is_empty() => FinishReason::Stop,
            Some("tool_use") => FinishReason::ToolCalls,
            Some("max_tokens") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Stop,
        };

        Completion {
            content,
            tool_calls,
            finish_reason,
            usage: Usage::new(wire.usage.input_tokens, wire.usage.output_tokens),
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> GraphResult<Completion> {
        let structured = request.output_schema.is_some();
        let body = self.build_body(&request, false);
        let response = self.post(&body).await?;
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(Self::convert_response(wire, structured))
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
                    let event: WireStreamEvent = serde_json::from_str(&data)
                        .map_err(LlmError::from)?;
                    match event {
                        WireStreamEvent::ContentBlockDelta { delta } => {
                            if let Some(text) = delta.text {
                                yield text;
                            }
                        }
                        WireStreamEvent::MessageStop => return,
                        _ => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

// Anthropic wire types.

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<WireToolChoice>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

impl WireMessage {
    fn is_tool_results(&self) -> bool {
        self.content
            .iter()
            .all(|block| matches!(block, WireBlock::ToolResult { .. }))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct WireToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireResponseBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireStreamEvent {
    MessageStart,
    ContentBlockStart,
    ContentBlockDelta { delta: WireDelta },
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    Ping,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    text: Option<String>,
}
