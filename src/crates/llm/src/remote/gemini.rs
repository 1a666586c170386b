//! Google Gemini client.
//!
//! Gemini speaks `contents` with `user`/`model` roles, a separate
//! `systemInstruction`, and function calling through `functionCall` /
//! `functionResponse` parts. Function calls carry no ids, so the adapter
//! synthesizes `{name}_{index}` to satisfy the canonical tool-call shape.
//! Structured output binds the schema via `responseSchema` with a JSON mime
//! type.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use agentgraph_core::error::Result as GraphResult;
use agentgraph_core::llm::{
    ChatProvider, Completion, CompletionRequest, ContentStream, FinishReason, Usage,
};
use agentgraph_core::messages::{Message, ToolCallRequest};

use crate::config::RemoteClientConfig;
use crate::error::LlmError;
use crate::remote::sse_data_lines;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    config: RemoteClientConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: RemoteClientConfig) -> crate::error::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn convert_messages(messages: &[Message]) -> (Option<Value>, Vec<WireContent>) {
        let mut system: Option<String> = None;
        let mut contents: Vec<WireContent> = Vec::new();

        for message in messages {
            match message {
                Message::System { content } => {
                    system = Some(match system {
                        Some(existing) => format!("{}\n\n{}", existing, content),
                        None => content.clone(),
                    });
                }
                Message::User { content } => contents.push(WireContent {
                    role: "user",
                    parts: vec![json!({"text": content})],
                }),
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut parts = Vec::new();
                    if !content.is_empty() {
                        parts.push(json!({"text": content}));
                    }
                    for call in tool_calls {
                        let args: Value =
                            serde_json::from_str(&call.arguments).unwrap_or(json!({}));
                        parts.push(json!({
                            "functionCall": {"name": call.name, "args": args}
                        }));
                    }
                    contents.push(WireContent {
                        role: "model",
                        parts,
                    });
                }
                Message::Tool { name, content, .. } => contents.push(WireContent {
                    role: "user",
                    parts: vec![json!({
                        "functionResponse": {
                            "name": name,
                            "response": {"result": content},
                        }
                    })],
                }),
            }
        }

        let system_instruction = system.map(|text| json!({"parts": [{"text": text}]}));
        (system_instruction, contents)
    }

    fn build_body(&self, request: &CompletionRequest) -> WireRequest {
        let (system_instruction, contents) = Self::convert_messages(&request.messages);

        let mut generation_config = json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(schema) = &request.output_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = schema.clone();
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![json!({
                "functionDeclarations": request
                    .tools
                    .iter()
                    .map(|tool| json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }))
                    .collect::<Vec<_>>()
            })])
        };

        WireRequest {
            contents,
            system_instruction,
            generation_config,
            tools,
        }
    }

    fn action_url(&self, model: &str, action: &str, sse: bool) -> String {
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{}/v1beta/models/{}:{}?{}key={}",
            self.config.base_url, model, action, alt, self.config.api_key
        )
    }

    async fn post(&self, url: &str, body: &WireRequest) -> crate::error::Result<reqwest::Response> {
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }
        Ok(response)
    }

    fn convert_candidate(candidate: WireCandidate) -> (String, Vec<ToolCallRequest>) {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = call.get("args").cloned().unwrap_or(json!({}));
                tool_calls.push(ToolCallRequest {
                    id: format!("{}_{}", name, tool_calls.len()),
                    name,
                    arguments: args.to_string(),
                });
            }
        }

        (content, tool_calls)
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> GraphResult<Completion> {
        let body = self.build_body(&request);
        let url = self.action_url(&request.model, "generateContent", false);
        let response = self.post(&url, &body).await?;
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let candidate = wire
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no candidates".to_string()))?;

        let finish = candidate.finish_reason.clone();
        let (content, tool_calls) = Self::convert_candidate(candidate);

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            match finish.as_deref() {
                Some("STOP") | None => FinishReason::Stop,
                Some("MAX_TOKENS") => FinishReason::Length,
                Some(other) => FinishReason::Other(other.to_string()),
            }
        };

        let usage = wire
            .usage_metadata
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(Completion {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    async fn stream_complete(&self, request: CompletionRequest) -> GraphResult<ContentStream> {
        let body = self.build_body(&request);
        let url = self.action_url(&request.model, "streamGenerateContent", true);
        let response = self.post(&url, &body).await?;
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(LlmError::from)?;
                let text = String::from_utf8_lossy(&chunk);
                for data in sse_data_lines(&text) {
                    let wire: WireResponse = serde_json::from_str(&data)
                        .map_err(LlmError::from)?;
                    for candidate in wire.candidates {
                        let (content, _) = GeminiClient::convert_candidate(candidate);
                        if !content.is_empty() {
                            yield content;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}

// Gemini wire types. Parts stay loosely typed: a part is a one-key object
// whose key decides its meaning.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Value>,
    generation_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
