//! Configuration loading, validation, and management for Concierge.
//!
//! Loads configuration from `~/.concierge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use concierge_core::{GenerationConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.concierge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the Anthropic API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model used for every turn
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

fn default_model() -> String {
    "claude-3-haiku-20240307".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    1000
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
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("search", &self.search)
            .finish()
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI restaurant concierge assistant. \
Your role is to help users find restaurants, provide information about specific restaurants, \
and manage a database of restaurant information. You will be given a set of tools to accomplish these tasks. \
If a user hasn't given you a location, always ask instead of searching with no location reference.";

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Cap on MODEL_CALL iterations per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Per-attempt budget for a model call
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Budget for each individual tool execution
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            stop_sequences: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Backoff schedule for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_backoff(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            )
            .with_multiplier(self.multiplier);
        if self.jitter { policy } else { policy.without_jitter() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Where conversation state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationBackend {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// One JSONL file per thread
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub conversations: ConversationBackend,

    /// Directory for the file backend (default `~/.concierge/threads`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_dir: Option<PathBuf>,

    /// SQLite URL for restaurant records; unset keeps records in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            conversations: ConversationBackend::Memory,
            conversation_dir: None,
            database_url: None,
        }
    }
}

impl StoreConfig {
    pub fn conversation_dir(&self) -> PathBuf {
        self.conversation_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("threads"))
    }
}

/// Search provider credentials and endpoints.
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valueserp_api_key: Option<String>,

    #[serde(default = "default_valueserp_url")]
    pub valueserp_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youcom_api_key: Option<String>,

    #[serde(default = "default_youcom_url")]
    pub youcom_url: String,

    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_valueserp_url() -> String {
    "https://api.valueserp.com".into()
}
fn default_youcom_url() -> String {
    "https://api.ydc-index.io".into()
}
fn default_search_timeout_secs() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            valueserp_api_key: None,
            valueserp_url: default_valueserp_url(),
            youcom_api_key: None,
            youcom_url: default_youcom_url(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("valueserp_api_key", &redact(&self.valueserp_api_key))
            .field("valueserp_url", &self.valueserp_url)
            .field("youcom_api_key", &redact(&self.youcom_api_key))
            .field("youcom_url", &self.youcom_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path. A missing file yields defaults.
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

    /// `CONCIERGE_MODEL` wins over the file. API keys are only filled from
    /// the environment when the file leaves them unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("ANTHROPIC_API_KEY");
        }
        if self.search.valueserp_api_key.is_none() {
            self.search.valueserp_api_key = lookup("VALUESERP_API_KEY");
        }
        if self.search.youcom_api_key.is_none() {
            self.search.youcom_api_key = lookup("YOUCOM_API_KEY");
        }
        if let Some(model) = lookup("CONCIERGE_MODEL") {
            self.model = model;
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".concierge")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.multiplier must be >= 1.0".into(),
            ));
        }
        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generation settings for the model gateway.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.model.clone(),
            system_prompt: Some(self.agent.system_prompt.clone()),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stop: self.agent.stop_sequences.clone(),
            time_budget: Duration::from_secs(self.agent.model_timeout_secs),
        }
    }

    /// Per-request timeout for the search clients.
    ///
    /// One search tool call may make `retry.max_attempts` requests with
    /// backoff in between, all inside `agent.tool_timeout_secs`. Each request
    /// gets an equal share of what the backoff leaves, capped by
    /// `search.timeout_secs`.
    pub fn search_request_timeout(&self) -> Duration {
        let policy = self.retry.to_policy();
        let attempts = policy.max_attempts.max(1);
        let share = self
            .agent
            .tool_timeout()
            .saturating_sub(policy.worst_case_backoff())
            / attempts;
        share
            .min(Duration::from_secs(self.search.timeout_secs))
            .max(MIN_SEARCH_REQUEST_TIMEOUT)
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

const MIN_SEARCH_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

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

impl From<ConfigError> for concierge_core::Error {
    fn from(e: ConfigError) -> Self {
        concierge_core::Error::Config {
            message: e.to_string(),
        }
    }
}
