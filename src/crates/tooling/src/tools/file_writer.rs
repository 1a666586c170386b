//! File writer tool.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};

use agentgraph_core::tool::{Tool, ToolError, ToolResult};

/// `builtin:file_writer` - write text files under a configured base
/// directory. Paths are normalized and may not escape the base.
pub struct FileWriterTool {
    base_dir: PathBuf,
}

impl FileWriterTool {
    pub fn from_config(config: &Value) -> ToolResult<Self> {
        let base_dir = config
            .get("base_dir")
            .and_then(Value::as_str)
            .unwrap_or("./workspace");
        Ok(Self {
            base_dir: PathBuf::from(base_dir),
        })
    }

    fn resolve(&self, relative: &str) -> ToolResult<PathBuf> {
        let path = Path::new(relative);
        if path.is_absolute() {
            return Err(ToolError::InvalidArguments {
                tool: "file_writer".to_string(),
                message: format!("path must be relative: {}", relative),
            });
        }
        for component in path.components() {
            if matches!(component, Component::ParentDir) {
                return Err(ToolError::InvalidArguments {
                    tool: "file_writer".to_string(),
                    message: format!("path may not contain '..': {}", relative),
                });
            }
        }
        Ok(self.base_dir.join(path))
    }
}

#[async_trait]
impl Tool for FileWriterTool {
    fn name(&self) -> &str {
        "file_writer"
    }

    fn description(&self) -> &str {
        "Write text content to a file under the workspace directory."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Relative file path"},
                "content": {"type": "string", "description": "Text content to write"},
            },
            "required": ["path", "content"],
        })
    }

    async fn invoke(&self, args: Value) -> ToolResult<Value> {
        let relative = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "file_writer".to_string(),
                message: "missing 'path'".to_string(),
            })?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "file_writer".to_string(),
                message: "missing 'content'".to_string(),
            })?;

        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool: "file_writer".to_string(),
                    message: e.to_string(),
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "file_writer".to_string(),
                message: e.to_string(),
            })?;

        Ok(json!({
            "path": path.to_string_lossy(),
            "bytes_written": content.len(),
        }))
    }
}
