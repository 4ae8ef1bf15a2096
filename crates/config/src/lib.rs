//! Configuration loading, validation, and management for StreamBot.
//!
//! Loads configuration from `~/.streambot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.streambot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bearer key passed to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider preset ("deepseek", "openai", "openrouter", "ollama", "custom")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Override the preset's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Request engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Conversation history storage
    #[serde(default)]
    pub history: HistoryConfig,

    /// Usage metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "deepseek".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
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
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stop", &self.stop)
            .field("engine", &self.engine)
            .field("history", &self.history)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

/// Tuning for the streaming request engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many recent answered turns are replayed as context
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Deadline for a whole request, continuations included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of tool continuations per request
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Requests a single user may have in flight
    #[serde(default = "default_max_user_chats")]
    pub max_user_chats: usize,

    /// Length (UTF-16 units) at which the first frame of a segment is flushed
    #[serde(default = "default_first_send_len")]
    pub first_send_len: usize,

    /// Amount the flush threshold grows by after each flush
    #[serde(default = "default_send_len_step")]
    pub send_len_step: usize,

    /// Hard per-message ceiling of the target platform
    #[serde(default = "default_message_ceiling")]
    pub message_ceiling: usize,
}

fn default_history_window() -> usize {
    10
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_max_tool_iterations() -> usize {
    25
}
fn default_max_user_chats() -> usize {
    2
}
fn default_first_send_len() -> usize {
    30
}
fn default_send_len_step() -> usize {
    500
}
fn default_message_ceiling() -> usize {
    3896
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
            max_user_chats: default_max_user_chats(),
            first_send_len: default_first_send_len(),
            send_len_step: default_send_len_step(),
            message_ceiling: default_message_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// Database file; defaults to `~/.streambot/history.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_history_backend() -> String {
    "sqlite".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

impl HistoryConfig {
    /// The database path, falling back to the config directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("history.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether usage metrics are collected
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.streambot/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `STREAMBOT_API_KEY`, then `DEEPSEEK_API_KEY`, `OPENAI_API_KEY`,
    ///   `OPENROUTER_API_KEY` (only when the file sets no key)
    /// - `STREAMBOT_PROVIDER`, `STREAMBOT_MODEL`, `STREAMBOT_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("STREAMBOT_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = lookup("DEEPSEEK_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(provider) = lookup("STREAMBOT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("STREAMBOT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("STREAMBOT_BASE_URL") {
            self.base_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".streambot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let engine = &self.engine;
        if engine.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "engine.history_window must be > 0".into(),
            ));
        }
        if engine.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "engine.request_timeout_secs must be > 0".into(),
            ));
        }
        if engine.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_tool_iterations must be > 0".into(),
            ));
        }
        if engine.max_user_chats == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_user_chats must be > 0".into(),
            ));
        }
        if engine.send_len_step == 0 {
            return Err(ConfigError::ValidationError(
                "engine.send_len_step must be > 0".into(),
            ));
        }
        if engine.first_send_len >= engine.message_ceiling {
            return Err(ConfigError::ValidationError(format!(
                "engine.first_send_len ({}) must be below engine.message_ceiling ({})",
                engine.first_send_len, engine.message_ceiling
            )));
        }

        match self.history.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown history backend '{other}' (expected 'sqlite' or 'memory')"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
            engine: EngineConfig::default(),
            history: HistoryConfig::default(),
            telemetry: TelemetryConfig::default(),
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
