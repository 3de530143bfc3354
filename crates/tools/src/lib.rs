//! Built-in tool implementations for IronTask.
//!
//! Tools give the agent the ability to act: run commands, read and write
//! files, and search the web. External tools arrive through the manifest
//! warehouse source.
//!
//! Security defaults:
//! - Shell: allowlisted commands only (ls, cat, echo, git, etc.)
//! - File read/write: confined to the configured workspace root

pub mod file_read;
pub mod file_write;
pub mod manifest;
pub mod paths;
pub mod shell;
pub mod web_search;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use manifest::{ExternalCommandTool, ManifestSource, ToolManifest};
pub use shell::ShellTool;
pub use web_search::WebSearchTool;

use irontask_core::error::ToolError;
use irontask_core::tool::{Tool, ToolRegistry, ToolSource};
use std::path::PathBuf;

/// The static registration table of built-in tools.
///
/// Adding a tool means adding a constructor here — the loop never changes.
pub struct BuiltinSource {
    workspace: PathBuf,
    shell_allowlist: Vec<String>,
}

impl BuiltinSource {
    pub fn new(workspace: impl Into<PathBuf>, shell_allowlist: Vec<String>) -> Self {
        Self {
            workspace: workspace.into(),
            shell_allowlist,
        }
    }
}

impl ToolSource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn load(&self) -> Result<Vec<Box<dyn Tool>>, ToolError> {
        Ok(vec![
            Box::new(FileReadTool::new(&self.workspace)),
            Box::new(FileWriteTool::new(&self.workspace)),
            Box::new(ShellTool::new(self.shell_allowlist.clone()).with_workspace(&self.workspace)),
            Box::new(WebSearchTool::default()),
        ])
    }
}

/// Create a registry with all built-in tools, rooted at the given workspace.
pub fn default_registry(workspace: impl Into<PathBuf>) -> ToolRegistry {
    let safe_commands = [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "wc", "grep", "find", "which", "git",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let sources: Vec<Box<dyn ToolSource>> =
        vec![Box::new(BuiltinSource::new(workspace, safe_commands))];

    let mut registry = ToolRegistry::new();
    registry.discover(&sources);
    registry
}
