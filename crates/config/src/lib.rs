//! Configuration loading, validation, and management for LoopWright.
//!
//! Loads configuration from `~/.loopwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.loopwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Step-loop budgets and timeouts
    #[serde(default)]
    pub run: RunConfig,

    /// Anomaly detection thresholds
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Workspace sandbox settings for file tools
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("run", &self.run)
            .field("anomaly", &self.anomaly)
            .field("workspace", &self.workspace)
            .finish()
    }
}

/// Budgets and timeouts for one run of the step loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum tool dispatches per step
    #[serde(default = "default_max_tools_per_step")]
    pub max_tools_per_step: u32,

    /// Timeout for a single model call, in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Timeout for a single tool execution, in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// How many times a failed model call is retried before the run is
    /// terminated as model-unavailable
    #[serde(default = "default_model_retries")]
    pub model_retries: u32,

    /// Base backoff between model retries, in milliseconds (doubles per
    /// attempt)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_steps() -> u32 {
    10
}
fn default_max_tools_per_step() -> u32 {
    8
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_model_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_tools_per_step: default_max_tools_per_step(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            model_retries: default_model_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Thresholds for the anomaly detector and circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Consecutive anomalous steps before the circuit opens
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,

    /// Further anomalous steps tolerated while the circuit is open before
    /// the run is aborted
    #[serde(default = "default_fatal_grace")]
    pub fatal_grace: u32,
}

fn default_warning_threshold() -> u32 {
    3
}
fn default_fatal_grace() -> u32 {
    1
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
            fatal_grace: default_fatal_grace(),
        }
    }
}

/// Sandbox settings for file and process tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory file tools may touch. Empty = current directory.
    #[serde(default)]
    pub root: Option<String>,

    /// Forbidden path prefixes
    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,

    /// Programs `run_command` may execute
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

fn default_forbidden_paths() -> Vec<String> {
    vec![
        "/etc".into(),
        "/proc".into(),
        "/sys".into(),
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.aws".into(),
    ]
}

fn default_allowed_commands() -> Vec<String> {
    vec![
        "ls".into(),
        "cat".into(),
        "head".into(),
        "tail".into(),
        "echo".into(),
        "pwd".into(),
        "date".into(),
        "wc".into(),
        "grep".into(),
        "find".into(),
        "git".into(),
        "cargo".into(),
        "python".into(),
    ]
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            forbidden_paths: default_forbidden_paths(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.loopwright/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `LOOPWRIGHT_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("LOOPWRIGHT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("LOOPWRIGHT_API_URL") {
            config.api_url = url;
        }

        if let Ok(model) = std::env::var("LOOPWRIGHT_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopwright")
    }

    /// Get the default workspace directory path.
    pub fn workspace_dir() -> PathBuf {
        Self::config_dir().join("workspace")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.run.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "run.max_steps must be at least 1".into(),
            ));
        }

        if self.run.max_tools_per_step == 0 {
            return Err(ConfigError::ValidationError(
                "run.max_tools_per_step must be at least 1".into(),
            ));
        }

        if self.anomaly.warning_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "anomaly.warning_threshold must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            run: RunConfig::default(),
            anomaly: AnomalyConfig::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
