//! File write tool — write or create files inside the workspace.

use crate::paths::resolve_in_workspace;
use async_trait::async_trait;
use irontask_core::error::ToolError;
use irontask_core::tool::{Tool, ToolResult};
use std::path::PathBuf;

pub struct FileWriteTool {
    workspace: PathBuf,
}

impl FileWriteTool {
    /// Create a file write tool scoped to the given workspace root.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let resolved = match resolve_in_workspace(&self.workspace, path) {
            Ok(p) => p,
            Err(reason) => {
                return Err(ToolError::PermissionDenied {
                    tool_name: "file_write".into(),
                    reason,
                })
            }
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolResult::error(format!("Failed to create directory: {e}")));
            }
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Wrote {} bytes to {path}",
                content.len()
            ))),
            Err(e) => Ok(ToolResult::error(format!("Failed to write file: {e}"))),
        }
    }
}
