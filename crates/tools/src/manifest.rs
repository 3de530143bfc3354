//! Manifest-based tool source — the external tool warehouse.
//!
//! A warehouse is a directory of JSON manifests, each declaring a tool the
//! agent may call: its name, description, parameter schema, and the command
//! to run. Invocation launches the declared argv with the JSON arguments on
//! stdin and returns stdout as the result.
//!
//! Manifest format:
//!
//! ```json
//! {
//!   "name": "image_info",
//!   "description": "Inspect an image file",
//!   "parameters": { "type": "object", "properties": { "path": { "type": "string" } } },
//!   "command": ["python3", "/opt/warehouse/image_info.py"]
//! }
//! ```
//!
//! A malformed manifest is skipped with a warning; the rest of the
//! directory still loads.

use async_trait::async_trait;
use irontask_core::error::ToolError;
use irontask_core::tool::{Tool, ToolResult, ToolSource};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// One parsed tool manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,
    pub command: Vec<String>,
}

fn default_parameters() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolManifest {
    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("manifest has an empty name".into());
        }
        if self.command.is_empty() {
            return Err(format!("manifest '{}' has an empty command", self.name));
        }
        Ok(())
    }
}

/// A tool backed by an external command declared in a manifest.
pub struct ExternalCommandTool {
    manifest: ToolManifest,
}

impl ExternalCommandTool {
    pub fn new(manifest: ToolManifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl Tool for ExternalCommandTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.manifest.parameters.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let program = &self.manifest.command[0];
        let args = &self.manifest.command[1..];

        debug!(tool = %self.manifest.name, program = %program, "Running external tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.manifest.name.clone(),
                reason: format!("failed to spawn '{program}': {e}"),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = arguments.to_string();
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                warn!(tool = %self.manifest.name, error = %e, "Failed to write tool stdin");
            }
            // Close stdin so the child sees EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.manifest.name.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            Ok(ToolResult::ok(stdout))
        } else {
            let code = output.status.code().unwrap_or(-1);
            Ok(ToolResult::error(format!(
                "[exit code: {code}] {stderr}"
            )))
        }
    }
}

/// Tool source that scans a directory of JSON manifests.
pub struct ManifestSource {
    dir: PathBuf,
}

impl ManifestSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ToolSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn load(&self) -> Result<Vec<Box<dyn Tool>>, ToolError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ToolError::SourceFailed {
            source_name: format!("manifest({})", self.dir.display()),
            reason: e.to_string(),
        })?;

        let mut tools: Vec<Box<dyn Tool>> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let manifest: ToolManifest = match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
            {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed tool manifest");
                    continue;
                }
            };

            if let Err(e) = manifest.validate() {
                warn!(path = %path.display(), error = %e, "Skipping invalid tool manifest");
                continue;
            }

            debug!(tool = %manifest.name, path = %path.display(), "Loaded tool manifest");
            tools.push(Box::new(ExternalCommandTool::new(manifest)));
        }

        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irontask_core::tool::ToolRegistry;

    fn write_manifest(dir: &std::path::Path, file: &str, json: serde_json::Value) {
        std::fs::write(dir.join(file), serde_json::to_string_pretty(&json).unwrap()).unwrap();
    }

    #[test]
    fn loads_valid_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "echo.json",
            serde_json::json!({
                "name": "wh_echo",
                "description": "Echo via cat",
                "command": ["cat"]
            }),
        );
        write_manifest(
            dir.path(),
            "date.json",
            serde_json::json!({
                "name": "wh_date",
                "description": "Current date",
                "command": ["date"]
            }),
        );

        let source = ManifestSource::new(dir.path());
        let tools = source.load().unwrap();
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn malformed_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "good.json",
            serde_json::json!({
                "name": "wh_ok",
                "description": "Fine",
                "command": ["true"]
            }),
        );
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        write_manifest(
            dir.path(),
            "no_command.json",
            serde_json::json!({
                "name": "wh_bad",
                "description": "Missing command",
                "command": []
            }),
        );

        let source = ManifestSource::new(dir.path());
        let tools = source.load().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "wh_ok");
    }

    #[test]
    fn missing_directory_is_a_source_failure() {
        let source = ManifestSource::new("/tmp/irontask_test_no_such_warehouse");
        assert!(matches!(
            source.load(),
            Err(ToolError::SourceFailed { .. })
        ));
    }

    #[tokio::test]
    async fn external_tool_receives_args_on_stdin() {
        let tool = ExternalCommandTool::new(ToolManifest {
            name: "wh_cat".into(),
            description: "Echo stdin".into(),
            parameters: default_parameters(),
            command: vec!["cat".into()],
        });

        let result = tool
            .execute(serde_json::json!({"key": "value"}))
            .await
            .unwrap();
        assert!(!result.is_error());
        assert!(result.output.contains("\"key\":\"value\""));
    }

    #[tokio::test]
    async fn external_tool_failure_is_error_result() {
        let tool = ExternalCommandTool::new(ToolManifest {
            name: "wh_fail".into(),
            description: "Always fails".into(),
            parameters: default_parameters(),
            command: vec!["sh".into(), "-c".into(), "echo oops >&2; exit 2".into()],
        });

        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.is_error());
        assert!(result.output.contains("exit code: 2"));
        assert!(result.output.contains("oops"));
    }

    #[tokio::test]
    async fn discovered_tools_invoke_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "hello.json",
            serde_json::json!({
                "name": "wh_hello",
                "description": "Say hello",
                "command": ["sh", "-c", "echo hello-from-warehouse"]
            }),
        );

        let sources: Vec<Box<dyn ToolSource>> = vec![Box::new(ManifestSource::new(dir.path()))];
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.discover(&sources), 1);

        let result = registry
            .invoke(&irontask_core::tool::ToolCall {
                id: "c1".into(),
                name: "wh_hello".into(),
                arguments: serde_json::json!({}),
            })
            .await;
        assert!(!result.is_error());
        assert!(result.output.contains("hello-from-warehouse"));
    }
}
