//! Tool capability and registry
//!
//! A tool is a named capability `{name, description, json_schema,
//! invoke(args) -> result}` that agents can call during their tool loop. The
//! registry resolves `implementation_ref` strings from the entity store:
//! `builtin:{name}` references a factory that constructs a fresh instance
//! from the tool's `config`, `custom:{name}` references an instance
//! registered at process start. The registry is frozen after startup and
//! shared read-only across executions.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::llm::ToolSchema;

/// Errors from tool resolution and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool reference '{0}': expected 'builtin:name' or 'custom:name'")]
    InvalidReference(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool '{tool}' execution failed: {message}")]
    ExecutionFailed { tool: String, message: String },
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// An invocable tool. Implementations must be `Send + Sync`; one instance may
/// serve concurrent executions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to request this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the arguments object.
    fn schema(&self) -> Value;

    /// Execute with decoded arguments. Errors are captured by the agent loop
    /// as an error tool turn, never propagated out of the node.
    async fn invoke(&self, args: Value) -> ToolResult<Value>;
}

/// The [`ToolSchema`] handed to providers for a tool.
pub fn provider_schema(tool: &dyn Tool) -> ToolSchema {
    ToolSchema {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.schema(),
    }
}

/// Factory for built-in tool classes, constructed on demand with the
/// persisted tool `config`.
pub type ToolFactory =
    Arc<dyn Fn(&Value) -> ToolResult<Arc<dyn Tool>> + Send + Sync>;

/// Registry of built-in tool factories and custom tool instances.
#[derive(Default)]
pub struct ToolRegistry {
    builtins: HashMap<String, ToolFactory>,
    custom: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in tool class under `builtin:{name}`.
    pub fn register_builtin(
        &mut self,
        name: impl Into<String>,
        factory: ToolFactory,
    ) {
        self.builtins.insert(name.into(), factory);
    }

    /// Register a custom tool instance under its full reference
    /// (e.g. `custom:my_tool`). Only valid before the registry is shared.
    pub fn register_custom(&mut self, reference: impl Into<String>, tool: Arc<dyn Tool>) {
        self.custom.insert(reference.into(), tool);
    }

    /// Resolve a reference to a tool instance.
    pub fn get(&self, reference: &str, config: &Value) -> ToolResult<Arc<dyn Tool>> {
        if let Some(name) = reference.strip_prefix("builtin:") {
            let factory = self.builtins.get(name).ok_or_else(|| {
                ToolError::NotFound(format!(
                    "built-in tool '{}' (available: {})",
                    name,
                    self.builtin_names().join(", ")
                ))
            })?;
            return factory(config);
        }

        if reference.starts_with("custom:") {
            return self
                .custom
                .get(reference)
                .cloned()
                .ok_or_else(|| ToolError::NotFound(reference.to_string()));
        }

        Err(ToolError::InvalidReference(reference.to_string()))
    }

    pub fn builtin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn custom_references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.custom.keys().cloned().collect();
        refs.sort();
        refs
    }
}
