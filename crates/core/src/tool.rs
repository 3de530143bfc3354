//! Tool trait, discovery sources, and the tool registry.
//!
//! Tools are what give the agent the ability to act in the world: execute
//! commands, read/write files, search the web. They are numerous,
//! independently authored, and individually unreliable, so the registry is
//! the seam that converts their heterogeneous failure modes into one uniform
//! result contract.
//!
//! The registry's central invariant: **no tool failure propagates past
//! [`ToolRegistry::invoke`]**. Unknown names, tool errors, and timeouts all
//! come back as error-status [`ToolResult`]s for the model to reason about.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// Outcome tag carried by every tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// The structured result of a tool invocation.
///
/// Tools report their own failures here too (e.g. "file not found") — a
/// returned `Error` status and a raised [`ToolError`] are equivalent from
/// the caller's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the invocation succeeded
    pub status: ToolStatus,

    /// Human/model-readable output or error text
    pub output: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Ok,
            output: output.into(),
            data: None,
        }
    }

    /// A successful result with a structured payload.
    pub fn ok_with_data(output: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: ToolStatus::Ok,
            output: output.into(),
            data: Some(data),
        }
    }

    /// A failed result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: message.into(),
            data: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

/// The contract every tool satisfies: a schema plus a callable.
///
/// Descriptors are immutable once registered and live for the process
/// lifetime.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// A tool may report failure either by returning an error-status
    /// [`ToolResult`] or by returning `Err` — the registry flattens both.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A place tools come from: the built-in set, a manifest directory, an
/// external warehouse.
///
/// Sources are enumerated once at discovery time. A source that fails to
/// load is skipped — discovery as a whole never fails because one source is
/// broken.
pub trait ToolSource: Send + Sync {
    /// A human-readable name for logging.
    fn name(&self) -> &str;

    /// Enumerate the tools this source provides.
    fn load(&self) -> std::result::Result<Vec<Box<dyn Tool>>, ToolError>;
}

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// The registry is built once (registration, then discovery) and treated as
/// read-only afterwards, so it can be shared across concurrent runs behind
/// an `Arc` without locking.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    /// Registration order, so `definitions()` is deterministic.
    order: Vec<String>,
    tool_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Register a tool. Names are unique: registering a name twice fails
    /// with [`ToolError::DuplicateTool`] rather than silently replacing.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        debug!(tool = %name, "Registered tool");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Enumerate and register every tool the given sources provide.
    ///
    /// A source that fails to load is skipped with a warning; a duplicate
    /// name from a later source is skipped with a warning. Returns the
    /// number of tools registered.
    pub fn discover(&mut self, sources: &[Box<dyn ToolSource>]) -> usize {
        let mut registered = 0;
        for source in sources {
            let tools = match source.load() {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(source = %source.name(), error = %e, "Tool source failed to load, skipping");
                    continue;
                }
            };
            for tool in tools {
                let name = tool.name().to_string();
                match self.register(tool) {
                    Ok(()) => registered += 1,
                    Err(e) => {
                        warn!(source = %source.name(), tool = %name, error = %e, "Skipping tool");
                    }
                }
            }
        }
        debug!(count = registered, "Tool discovery complete");
        registered
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, in registration order (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool call, converting every failure mode into an
    /// error-status result.
    ///
    /// This is a total function: unknown names, tool errors, and tool
    /// timeouts all come back as `ToolResult`s. Callers must not have to
    /// guard against a crashing tool.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            return ToolResult::error(format!("Unknown tool '{}'", call.name));
        };

        debug!(tool = %call.name, "Invoking tool");
        match tokio::time::timeout(self.tool_timeout, tool.execute(call.arguments.clone())).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(format!("Tool '{}' failed: {}", call.name, e))
            }
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.tool_timeout.as_secs(), "Tool timed out");
                ToolResult::error(format!(
                    "Tool '{}' timed out after {}s",
                    call.name,
                    self.tool_timeout.as_secs()
                ))
            }
        }
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(text))
        }
    }

    /// A tool that always returns Err.
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "deliberate failure".into(),
            })
        }
    }

    /// A tool that never finishes.
    struct HangingTool;

    #[async_trait]
    impl Tool for HangingTool {
        fn name(&self) -> &str {
            "hanging"
        }
        fn description(&self) -> &str {
            "Never returns"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    struct StaticSource {
        name: &'static str,
        fail: bool,
        tool_names: Vec<&'static str>,
    }

    struct NamedEchoTool(&'static str);

    #[async_trait]
    impl Tool for NamedEchoTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(self.0))
        }
    }

    impl ToolSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }
        fn load(&self) -> std::result::Result<Vec<Box<dyn Tool>>, ToolError> {
            if self.fail {
                return Err(ToolError::SourceFailed {
                    source_name: self.name.into(),
                    reason: "unreachable".into(),
                });
            }
            Ok(self
                .tool_names
                .iter()
                .map(|&n| Box::new(NamedEchoTool(n)) as Box<dyn Tool>)
                .collect())
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedEchoTool("zeta"))).unwrap();
        registry.register(Box::new(NamedEchoTool("alpha"))).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "zeta");
        assert_eq!(defs[1].name, "alpha");
    }

    #[tokio::test]
    async fn invoke_executes_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        let result = registry
            .invoke(&call("echo", serde_json::json!({"text": "hello world"})))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn invoke_unknown_tool_returns_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .invoke(&call("nonexistent", serde_json::json!({})))
            .await;
        assert!(result.is_error());
        assert!(result.output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn invoke_flattens_tool_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(BrokenTool)).unwrap();

        let result = registry.invoke(&call("broken", serde_json::json!({}))).await;
        assert!(result.is_error());
        assert!(result.output.contains("deliberate failure"));
    }

    #[tokio::test]
    async fn invoke_times_out_hanging_tools() {
        let mut registry = ToolRegistry::new().with_tool_timeout(Duration::from_millis(50));
        registry.register(Box::new(HangingTool)).unwrap();

        let result = registry.invoke(&call("hanging", serde_json::json!({}))).await;
        assert!(result.is_error());
        assert!(result.output.contains("timed out"));
    }

    #[tokio::test]
    async fn invoke_survives_malformed_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        // Wrong argument shape entirely — still a structured result.
        let result = registry
            .invoke(&call("echo", serde_json::json!([1, 2, 3])))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.output, "");
    }

    #[test]
    fn discovery_skips_broken_source() {
        let sources: Vec<Box<dyn ToolSource>> = vec![
            Box::new(StaticSource {
                name: "good_a",
                fail: false,
                tool_names: vec!["a1", "a2"],
            }),
            Box::new(StaticSource {
                name: "bad",
                fail: true,
                tool_names: vec![],
            }),
            Box::new(StaticSource {
                name: "good_b",
                fail: false,
                tool_names: vec!["b1"],
            }),
        ];

        let mut registry = ToolRegistry::new();
        let count = registry.discover(&sources);
        assert_eq!(count, 3);
        assert_eq!(registry.definitions().len(), 3);
        assert!(registry.get("a1").is_some());
        assert!(registry.get("b1").is_some());
    }

    #[test]
    fn discovery_skips_duplicate_names() {
        let sources: Vec<Box<dyn ToolSource>> = vec![
            Box::new(StaticSource {
                name: "first",
                fail: false,
                tool_names: vec!["shared"],
            }),
            Box::new(StaticSource {
                name: "second",
                fail: false,
                tool_names: vec!["shared", "unique"],
            }),
        ];

        let mut registry = ToolRegistry::new();
        let count = registry.discover(&sources);
        assert_eq!(count, 2);
        assert_eq!(registry.names(), vec!["shared", "unique"]);
    }
}
