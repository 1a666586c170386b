//! Agent node operator
//!
//! An agent node runs a bounded tool-calling dialogue: system turn from the
//! agent's instructions, a user turn assembled from the workflow state, then
//! up to [`MAX_TOOL_ITERATIONS`](crate::MAX_TOOL_ITERATIONS) provider calls,
//! executing requested tools between rounds. Tool failures become error tool
//! turns; provider failures fail the node. Oversized tool output and
//! intermediate values are truncated with an explicit marker.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::error::{GraphError, Result};
use crate::llm::{ChatProvider, CompletionRequest, ToolSchema};
use crate::messages::Message;
use crate::state::value_to_text;
use crate::tool::{provider_schema, Tool};
use crate::{MAX_TOOL_ITERATIONS, MAX_TOOL_OUTPUT_CHARS};

/// Sentinel output when the tool loop exhausts its iteration budget. The
/// step still completes: partial progress has been checkpointed.
pub const MAX_ITERATIONS_OUTPUT: &str = "Max tool iterations reached";

/// A compiled agent node: the agent record pre-resolved into a provider
/// handle, tool instances, and prompt configuration.
pub struct AgentOperator {
    /// Node id; also the key the result is stored under in `intermediate`.
    pub name: String,
    pub instructions: String,
    pub provider: Arc<dyn ChatProvider>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub output_schema: Option<Value>,
}

impl AgentOperator {
    /// Execute the agent against a state snapshot. Returns the partial state
    /// update and an optional recovered error (structured-output mismatch)
    /// to record on the step.
    pub async fn run(
        &self,
        state: &Value,
        cancel: &AtomicBool,
    ) -> Result<(Value, Option<String>)> {
        let mut messages = Vec::new();
        if !self.instructions.trim().is_empty() {
            messages.push(Message::system(self.instructions.clone()));
        }
        messages.push(Message::user(build_context(state)));

        let tools_by_name: HashMap<&str, &Arc<dyn Tool>> =
            self.tools.iter().map(|t| (t.name(), t)).collect();
        let tool_schemas: Vec<ToolSchema> =
            self.tools.iter().map(|t| provider_schema(t.as_ref())).collect();

        let mut raw_output: Option<String> = None;

        for _ in 0..MAX_TOOL_ITERATIONS {
            if cancel.load(Ordering::SeqCst) {
                return Err(GraphError::Cancelled);
            }

            let request = self.build_request(messages.clone(), &tool_schemas)?;
            let completion = self.provider.complete(request).await?;

            if completion.tool_calls.is_empty() {
                raw_output = Some(completion.content);
                break;
            }

            messages.push(Message::assistant_with_tools(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));

            for call in &completion.tool_calls {
                if cancel.load(Ordering::SeqCst) {
                    return Err(GraphError::Cancelled);
                }
                let content = self.execute_tool_call(&tools_by_name, &call.name, &call.arguments).await;
                messages.push(Message::tool(call.id.clone(), call.name.clone(), content));
            }
        }

        let raw_output = raw_output.unwrap_or_else(|| MAX_ITERATIONS_OUTPUT.to_string());
        let (output, soft_error) = self.parse_output(raw_output);

        let index = state.get("parallel_index").and_then(Value::as_u64);
        let intermediate_key = match index {
            Some(i) => format!("{}:{}", self.name, i),
            None => self.name.clone(),
        };

        let mut intermediate = serde_json::Map::new();
        intermediate.insert(intermediate_key, output.clone());
        let update = json!({
            "current_node": self.name.clone(),
            "intermediate": intermediate,
            "output": output,
        });
        Ok((update, soft_error))
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tool_schemas: &[ToolSchema],
    ) -> Result<CompletionRequest> {
        let mut request = CompletionRequest::new(self.model.clone(), messages);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        // Structured output wins over tools; the two are mutually exclusive
        // at the provider.
        if let Some(schema) = &self.output_schema {
            request.with_output_schema(schema.clone())
        } else if !tool_schemas.is_empty() {
            request.with_tools(tool_schemas.to_vec())
        } else {
            Ok(request)
        }
    }

    async fn execute_tool_call(
        &self,
        tools_by_name: &HashMap<&str, &Arc<dyn Tool>>,
        name: &str,
        arguments: &str,
    ) -> String {
        let Some(tool) = tools_by_name.get(name) else {
            return format!("Tool {} not found.", name);
        };

        let args: Value = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call arguments failed to decode");
                return format!("Error executing tool {}: invalid arguments: {}", name, e);
            }
        };

        match tool.invoke(args).await {
            Ok(result) => truncate_output(value_to_text(&result)),
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                format!("Error executing tool {}: {}", name, e)
            }
        }
    }

    /// Parse the final text as JSON when an output schema is bound. On parse
    /// or validation failure the raw string is kept and the mismatch is
    /// reported as a recovered error.
    fn parse_output(&self, text: String) -> (Value, Option<String>) {
        let Some(schema) = &self.output_schema else {
            return (Value::String(text), None);
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => match jsonschema::JSONSchema::compile(schema) {
                Ok(compiled) if compiled.is_valid(&parsed) => (parsed, None),
                Ok(_) => (
                    Value::String(text),
                    Some("structured output failed schema validation".to_string()),
                ),
                Err(e) => (parsed, Some(format!("output schema is not a valid schema: {}", e))),
            },
            Err(e) => (
                Value::String(text),
                Some(format!("structured output parse failed: {}", e)),
            ),
        }
    }
}

impl std::fmt::Debug for AgentOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOperator")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .field("output_schema", &self.output_schema.is_some())
            .finish()
    }
}

/// Compose the user turn from the state: caller input, truncated
/// intermediate outputs, and the fan-out item when present.
pub fn build_context(state: &Value) -> String {
    let mut parts = Vec::new();

    match state.get("input") {
        Some(Value::Object(input)) if !input.is_empty() => {
            let lines: Vec<String> = input
                .iter()
                .map(|(k, v)| format!("{}: {}", k, value_to_text(v)))
                .collect();
            parts.push(format!("## Input\n{}", lines.join("\n")));
        }
        Some(Value::String(input)) if !input.trim().is_empty() => {
            parts.push(format!("## Input\n{}", input));
        }
        _ => {}
    }

    if let Some(Value::Object(intermediate)) = state.get("intermediate") {
        for (node_name, node_output) in intermediate {
            let output_text = value_to_text(node_output);
            if output_text.trim().is_empty() {
                continue;
            }
            let output_text = if output_text.chars().count() > MAX_TOOL_OUTPUT_CHARS {
                let total = output_text.chars().count();
                let truncated: String = output_text.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
                format!("{}\n[TRUNCATED - {} chars total]", truncated, total)
            } else {
                output_text
            };
            parts.push(format!("## Output from {}\n{}", node_name, output_text));
        }
    }

    if let Some(item) = state.get("parallel_item").filter(|v| !v.is_null()) {
        let index = state
            .get("parallel_index")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let item_text = match item {
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string_pretty(item).unwrap_or_else(|_| item.to_string())
            }
            other => value_to_text(other),
        };
        parts.push(format!("## Current Task (Item {})\n{}", index + 1, item_text));
    }

    if parts.is_empty() {
        "Execute your task.".to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Truncate a tool result to the output bound, appending the marker suffix.
pub fn truncate_output(content: String) -> String {
    let total = content.chars().count();
    if total <= MAX_TOOL_OUTPUT_CHARS {
        return content;
    }
    warn!(total, limit = MAX_TOOL_OUTPUT_CHARS, "tool output truncated");
    let kept: String = content.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
    format!(
        "{}\n\n[OUTPUT TRUNCATED - showed {} of {} chars]",
        kept, MAX_TOOL_OUTPUT_CHARS, total
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_input_map() {
        let state = json!({"input": {"query": "2+2", "lang": "en"}});
        let context = build_context(&state);
        assert!(context.starts_with("## Input\n"));
        assert!(context.contains("query: 2+2"));
        assert!(context.contains("lang: en"));
    }

    #[test]
    fn test_context_includes_intermediate_outputs() {
        let state = json!({
            "input": {},
            "intermediate": {"research": "findings here"},
        });
        let context = build_context(&state);
        assert!(context.contains("## Output from research\nfindings here"));
    }

    #[test]
    fn test_context_parallel_item() {
        let state = json!({
            "input": {},
            "parallel_item": 20,
            "parallel_index": 1,
        });
        let context = build_context(&state);
        assert!(context.contains("## Current Task (Item 2)\n20"));
    }

    #[test]
    fn test_context_empty_state() {
        assert_eq!(build_context(&json!({})), "Execute your task.");
    }

    #[test]
    fn test_truncate_output_marker() {
        let long = "x".repeat(MAX_TOOL_OUTPUT_CHARS + 50);
        let truncated = truncate_output(long);
        assert!(truncated.ends_with(&format!(
            "[OUTPUT TRUNCATED - showed {} of {} chars]",
            MAX_TOOL_OUTPUT_CHARS,
            MAX_TOOL_OUTPUT_CHARS + 50
        )));
    }

    #[test]
    fn test_short_output_untouched() {
        assert_eq!(truncate_output("short".to_string()), "short");
    }
}
