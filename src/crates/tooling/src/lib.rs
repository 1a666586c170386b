//! Built-in tools for agentgraph agents
//!
//! Ships the `builtin:` tool classes (calculator, http_request, file_writer)
//! plus the HTTP-backed [`WebhookTool`](tools::WebhookTool) wrapper used for
//! `custom:` tools that live behind an endpoint. [`builtin_registry`]
//! constructs a registry with every built-in class registered; custom
//! instances are added by the host before the registry is shared.

pub mod tools;

use std::sync::Arc;

use agentgraph_core::tool::{Tool, ToolRegistry, ToolResult};
use serde_json::Value;

use tools::{CalculatorTool, FileWriterTool, HttpRequestTool};

/// A registry with all built-in tool classes registered.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register_builtin(
        "calculator",
        Arc::new(|_config: &Value| Ok(Arc::new(CalculatorTool) as Arc<dyn Tool>)),
    );
    registry.register_builtin(
        "http_request",
        Arc::new(|config: &Value| {
            HttpRequestTool::from_config(config).map(|tool| Arc::new(tool) as Arc<dyn Tool>)
        }),
    );
    registry.register_builtin(
        "file_writer",
        Arc::new(|config: &Value| {
            FileWriterTool::from_config(config).map(|tool| Arc::new(tool) as Arc<dyn Tool>)
        }),
    );

    registry
}

/// Shorthand used by tests and embedders.
pub fn builtin_tool(name: &str, config: &Value) -> ToolResult<Arc<dyn Tool>> {
    builtin_registry().get(&format!("builtin:{}", name), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_has_builtins() {
        let registry = builtin_registry();
        assert_eq!(
            registry.builtin_names(),
            vec!["calculator", "file_writer", "http_request"]
        );
    }

    #[tokio::test]
    async fn test_builtin_lookup_and_invoke() {
        let tool = builtin_tool("calculator", &json!({})).unwrap();
        let result = tool.invoke(json!({"expression": "6 * 7"})).await.unwrap();
        assert_eq!(result, json!(42));
    }
}
