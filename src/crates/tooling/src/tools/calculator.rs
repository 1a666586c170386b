//! Arithmetic calculator tool.
//!
//! Evaluates an arithmetic expression with the same engine that powers edge
//! conditions, so the grammar is identical and equally sandboxed.

use async_trait::async_trait;
use serde_json::{json, Value};

use agentgraph_core::expr;
use agentgraph_core::tool::{Tool, ToolError, ToolResult};

/// `builtin:calculator`
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / %, comparison \
         operators, and parentheses."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '2 + 2 * 10'",
                }
            },
            "required": ["expression"],
        })
    }

    async fn invoke(&self, args: Value) -> ToolResult<Value> {
        let expression = args
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "calculator".to_string(),
                message: "missing 'expression'".to_string(),
            })?;

        let parsed = expr::parse(expression).map_err(|e| ToolError::InvalidArguments {
            tool: "calculator".to_string(),
            message: e.to_string(),
        })?;

        // Conditions evaluate against a state root; the calculator has none.
        parsed
            .eval(&Value::Null)
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "calculator".to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_arithmetic() {
        let tool = CalculatorTool;
        assert_eq!(
            tool.invoke(json!({"expression": "2 + 2 * 10"})).await.unwrap(),
            json!(22)
        );
        assert_eq!(
            tool.invoke(json!({"expression": "(1 + 2) * 3.5"})).await.unwrap(),
            json!(10.5)
        );
    }

    #[tokio::test]
    async fn test_division_by_zero() {
        let tool = CalculatorTool;
        let err = tool.invoke(json!({"expression": "1 / 0"})).await.unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let tool = CalculatorTool;
        assert!(matches!(
            tool.invoke(json!({})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_state_access() {
        let tool = CalculatorTool;
        // 'state' evaluates to null here, so indexing it is an error.
        let err = tool
            .invoke(json!({"expression": "state['secret']"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
