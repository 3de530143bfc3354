//! Configuration loading, validation, and management for IronTask.
//!
//! Loads configuration from `~/.irontask/config.toml` with environment
//! variable overrides, validates it at startup, and hands an immutable
//! struct to the runtime. Nothing in here is a process-wide singleton —
//! the loop receives its configuration by injection, so tests can
//! substitute whatever they need.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.irontask/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Model used when no per-mode entry matches
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-query-mode model routing table
    #[serde(default)]
    pub models: ModelTable,

    /// Loop bounds and timeouts
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Retry policy for model-capability failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tool loading and execution settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Directory for checkpoint files (default `~/.irontask/checkpoints`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,

    /// System prompt for the agent
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}

fn default_system_prompt() -> String {
    "You are a capable assistant. Use the available tools when a task \
     requires acting on the world; answer directly when it does not."
        .into()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (e.g., "openrouter", "openai", "ollama")
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; `IRONTASK_API_KEY` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_provider_name() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

/// Model routing by query mode — the model-selection lookup table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelTable {
    /// Model for informational (no-tool) queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informational: Option<String>,

    /// Model for action (tool-using) queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Hard ceiling on reasoning iterations per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Timeout for one model completion attempt, seconds
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Timeout for one tool invocation, seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_model_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    60
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Completion attempts before giving up (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay, milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap, milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Defer tool discovery until a query actually needs tools
    #[serde(default = "default_true")]
    pub lazy_loading: bool,

    /// Workspace root for file tools (default: current directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Commands the shell tool may run; empty = allow all
    #[serde(default = "default_shell_allowlist")]
    pub shell_allowlist: Vec<String>,

    /// Optional directory of external tool manifests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_shell_allowlist() -> Vec<String> {
    ["ls", "cat", "head", "tail", "echo", "pwd", "date", "wc", "grep", "find", "which", "git"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            lazy_loading: true,
            workspace: None,
            shell_allowlist: default_shell_allowlist(),
            manifest_dir: None,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("provider", &self.provider)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("tools", &self.tools)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .finish()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            default_model: default_model(),
            models: ModelTable::default(),
            limits: LimitsConfig::default(),
            retry: RetryConfig::default(),
            tools: ToolsConfig::default(),
            checkpoint_dir: None,
            system_prompt: default_system_prompt(),
        }
    }
}

impl RuntimeConfig {
    /// Default config file location: `~/.irontask/config.toml`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".irontask").join("config.toml")
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist, then apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path (missing file = defaults), apply
    /// environment overrides, validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables override the file:
    /// `IRONTASK_API_KEY`, `IRONTASK_BASE_URL`, `IRONTASK_MODEL`,
    /// `IRONTASK_MAX_ITERATIONS`.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("IRONTASK_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("IRONTASK_BASE_URL") {
            if !url.is_empty() {
                self.provider.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("IRONTASK_MODEL") {
            if !model.is_empty() {
                self.default_model = model;
            }
        }
        if let Ok(max) = std::env::var("IRONTASK_MAX_ITERATIONS") {
            if let Ok(n) = max.parse() {
                self.limits.max_iterations = n;
            }
        }
    }

    /// Check invariants the runtime depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.is_empty() {
            return Err(ConfigError::Invalid("provider.base_url must not be empty".into()));
        }
        if self.default_model.is_empty() {
            return Err(ConfigError::Invalid("default_model must not be empty".into()));
        }
        if self.limits.max_iterations == 0 {
            return Err(ConfigError::Invalid("limits.max_iterations must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve the model for a query mode ("informational" or "action"),
    /// falling back to the default model.
    pub fn model_for(&self, mode: &str) -> &str {
        let entry = match mode {
            "informational" => self.models.informational.as_deref(),
            "action" => self.models.action.as_deref(),
            _ => None,
        };
        entry.unwrap_or(&self.default_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_iterations, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.tools.lazy_loading);
    }

    #[test]
    fn parses_minimal_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o"

[provider]
name = "openai"
base_url = "https://api.openai.com/v1"
api_key = "sk-test"

[limits]
max_iterations = 5

[models]
action = "gpt-4o"
informational = "gpt-4o-mini"
"#
        )
        .unwrap();

        let config = RuntimeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.limits.max_iterations, 5);
        assert_eq!(config.model_for("informational"), "gpt-4o-mini");
        assert_eq!(config.model_for("action"), "gpt-4o");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config =
            RuntimeConfig::load_from(Path::new("/tmp/irontask_test_no_such_config.toml")).unwrap();
        assert_eq!(config.default_model, default_model());
    }

    #[test]
    fn model_lookup_falls_back_to_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.model_for("action"), config.default_model);
        assert_eq!(config.model_for("unknown-mode"), config.default_model);
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = RuntimeConfig::default();
        config.limits.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = RuntimeConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
