//! File read tool — read file contents inside the workspace.

use crate::paths::resolve_in_workspace;
use async_trait::async_trait;
use irontask_core::error::ToolError;
use irontask_core::tool::{Tool, ToolResult};
use std::path::PathBuf;

pub struct FileReadTool {
    workspace: PathBuf,
}

impl FileReadTool {
    /// Create a file read tool scoped to the given workspace root.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path (relative to the workspace)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = match resolve_in_workspace(&self.workspace, path) {
            Ok(p) => p,
            Err(reason) => {
                return Err(ToolError::PermissionDenied {
                    tool_name: "file_read".into(),
                    reason,
                })
            }
        };

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::error(format!("Failed to read file: {e}"))),
        }
    }
}
