//! HTTP-backed custom tools.
//!
//! A custom tool that lives behind an endpoint: invocation POSTs the decoded
//! arguments as JSON and returns the response body. Registered under
//! `custom:{name}` at process start.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use agentgraph_core::tool::{Tool, ToolError, ToolResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool implemented by a remote HTTP endpoint.
pub struct WebhookTool {
    name: String,
    description: String,
    schema: Value,
    endpoint: String,
    client: Client,
}

impl WebhookTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        endpoint: impl Into<String>,
    ) -> ToolResult<Self> {
        let name = name.into();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool: name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            name,
            description: description.into(),
            schema,
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Tool for WebhookTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, args: Value) -> ToolResult<Value> {
        debug!(tool = %self.name, endpoint = %self.endpoint, "invoking webhook tool");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&args)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: self.name.clone(),
                message: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool: self.name.clone(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capability_surface() {
        let tool = WebhookTool::new(
            "sentiment",
            "Classify sentiment",
            json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            "https://tools.internal/sentiment",
        )
        .unwrap();

        assert_eq!(tool.name(), "sentiment");
        assert_eq!(tool.schema()["type"], "object");
    }
}
