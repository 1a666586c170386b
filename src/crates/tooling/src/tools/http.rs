//! HTTP request tool.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use agentgraph_core::tool::{Tool, ToolError, ToolResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `builtin:http_request` - GET or POST JSON against an arbitrary URL.
///
/// Config may pin a `base_url`; when set, the `url` argument is resolved
/// relative to it and absolute URLs elsewhere are rejected.
pub struct HttpRequestTool {
    base_url: Option<String>,
    client: Client,
}

impl HttpRequestTool {
    pub fn from_config(config: &Value) -> ToolResult<Self> {
        let base_url = config
            .get("base_url")
            .and_then(Value::as_str)
            .map(|s| s.trim_end_matches('/').to_string());
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "http_request".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    fn resolve_url(&self, url: &str) -> ToolResult<String> {
        match &self.base_url {
            Some(base) => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    return Err(ToolError::InvalidArguments {
                        tool: "http_request".to_string(),
                        message: format!(
                            "absolute URLs are not allowed when base_url is configured: {}",
                            url
                        ),
                    });
                }
                Ok(format!("{}/{}", base, url.trim_start_matches('/')))
            }
            None => Ok(url.to_string()),
        }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP GET or POST request and return the response body."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Request URL"},
                "method": {"type": "string", "enum": ["GET", "POST"], "default": "GET"},
                "body": {"type": "object", "description": "JSON body for POST requests"},
            },
            "required": ["url"],
        })
    }

    async fn invoke(&self, args: Value) -> ToolResult<Value> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "http_request".to_string(),
                message: "missing 'url'".to_string(),
            })?;
        let url = self.resolve_url(url)?;
        let method = args
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        let request = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => {
                let body = args.get("body").cloned().unwrap_or(json!({}));
                self.client.post(&url).json(&body)
            }
            other => {
                return Err(ToolError::InvalidArguments {
                    tool: "http_request".to_string(),
                    message: format!("unsupported method '{}'", other),
                })
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "http_request".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "http_request".to_string(),
                message: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool: "http_request".to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        // JSON responses come back structured, everything else as text.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_resolution() {
        let tool =
            HttpRequestTool::from_config(&json!({"base_url": "https://api.example.com/"})).unwrap();
        assert_eq!(
            tool.resolve_url("/v1/things").unwrap(),
            "https://api.example.com/v1/things"
        );
        assert!(tool.resolve_url("https://elsewhere.com/x").is_err());
    }

    #[test]
    fn test_without_base_url() {
        let tool = HttpRequestTool::from_config(&json!({})).unwrap();
        assert_eq!(
            tool.resolve_url("https://api.example.com/x").unwrap(),
            "https://api.example.com/x"
        );
    }

    #[tokio::test]
    async fn test_missing_url_argument() {
        let tool = HttpRequestTool::from_config(&json!({})).unwrap();
        assert!(matches!(
            tool.invoke(json!({"method": "GET"})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
    }
}
