//! TOML Configuration File Support
//!
//! Loads panel configuration from `~/.config/agent-panel/panel.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! socket_path = "/run/user/1000/agent-panel/backend.sock"
//! connect_timeout_ms = 5000
//! request_timeout_ms = 30000
//!
//! [chat]
//! default_provider = "openai"
//! default_model = "gpt-4o"
//! streaming = true
//! debug = false
//! title_max_chars = 40
//! preview_max_chars = 100
//!
//! [render]
//! cache_capacity = 100
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Setting |
//! |---|---|
//! | `PANEL_SOCKET` | `backend.socket_path` |
//! | `PANEL_CONNECT_TIMEOUT` | `backend.connect_timeout_ms` |
//! | `PANEL_REQUEST_TIMEOUT` | `backend.request_timeout_ms` |
//! | `PANEL_PROVIDER` | `chat.default_provider` |
//! | `PANEL_MODEL` | `chat.default_model` |
//! | `PANEL_STREAMING` | `chat.streaming` (`0`/`false` disables) |
//! | `PANEL_DEBUG` | `chat.debug` (`1`/`true` enables) |
//! | `PANEL_RENDER_CACHE_CAPACITY` | `render.cache_capacity` |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render_cache::DEFAULT_CAPACITY;
use crate::transport::config::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the highest-priority configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[backend]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Unix socket path of the agent backend
    pub socket_path: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Request timeout in milliseconds (0 = wait forever)
    pub request_timeout_ms: Option<u64>,
}

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Provider used when creating sessions
    pub default_provider: Option<String>,

    /// Model used when creating sessions
    pub default_model: Option<String>,

    /// Stream responses (false = request/response)
    pub streaming: Option<bool>,

    /// Ask the backend for debug output
    pub debug: Option<bool>,

    /// Length of titles derived from the first message
    pub title_max_chars: Option<usize>,

    /// Length of conversation previews
    pub preview_max_chars: Option<usize>,
}

/// `[render]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Render cache entries per conversation
    pub cache_capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelToml {
    /// Backend connection section
    pub backend: BackendToml,

    /// Chat behavior section
    pub chat: ChatToml,

    /// Rendering section
    pub render: RenderToml,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// Settings the turn controller works with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    /// Provider used when creating sessions (None = sessions must exist)
    pub default_provider: Option<String>,
    /// Model used when creating sessions
    pub default_model: Option<String>,
    /// Stream responses
    pub streaming: bool,
    /// Ask the backend for debug output
    pub debug: bool,
    /// Length of titles derived from the first message
    pub title_max_chars: usize,
    /// Length of conversation previews
    pub preview_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            default_model: None,
            streaming: true,
            debug: false,
            title_max_chars: 40,
            preview_max_chars: 100,
        }
    }
}

impl ChatConfig {
    /// Set the provider used for new sessions
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    /// Set the model used for new sessions
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Enable or disable streaming
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Centralized configuration for the panel
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct PanelConfig {
    /// Backend connection
    pub transport: TransportConfig,

    /// Turn behavior
    pub chat: ChatConfig,

    /// Render cache entries per conversation
    pub render_cache_capacity: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of the highest-priority value
    source: ConfigSource,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            chat: ChatConfig::default(),
            render_cache_capacity: DEFAULT_CAPACITY,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PanelConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that would make the panel misbehave
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "render.cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.chat.title_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "chat.title_max_chars must be at least 1".to_string(),
            ));
        }
        if self.transport.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "backend.connect_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/agent-panel/panel.toml` or
/// `~/.config/agent-panel/panel.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agent-panel").join("panel.toml"))
}

/// Load configuration from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<PanelConfig, ConfigError> {
    load_config_from_path(default_config_path().as_deref())
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the result
/// fails validation.
pub fn load_config_from_path(path: Option<&Path>) -> Result<PanelConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with a custom environment lookup
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the result
/// fails validation.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<PanelConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = PanelConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: PanelToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded configuration from file");
        } else {
            tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
        }
    }

    apply_env_config(&mut config, &env);
    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut PanelConfig, toml: &PanelToml) {
    if let Some(ref path) = toml.backend.socket_path {
        config.transport.socket_path = Some(PathBuf::from(path));
    }
    if let Some(timeout) = toml.backend.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(timeout) = toml.backend.request_timeout_ms {
        config.transport.request_timeout_ms = timeout;
    }

    if toml.chat.default_provider.is_some() {
        config.chat.default_provider = toml.chat.default_provider.clone();
    }
    if toml.chat.default_model.is_some() {
        config.chat.default_model = toml.chat.default_model.clone();
    }
    if let Some(streaming) = toml.chat.streaming {
        config.chat.streaming = streaming;
    }
    if let Some(debug) = toml.chat.debug {
        config.chat.debug = debug;
    }
    if let Some(chars) = toml.chat.title_max_chars {
        config.chat.title_max_chars = chars;
    }
    if let Some(chars) = toml.chat.preview_max_chars {
        config.chat.preview_max_chars = chars;
    }

    if let Some(capacity) = toml.render.cache_capacity {
        config.render_cache_capacity = capacity;
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off" | "")
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut PanelConfig, env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env("PANEL_SOCKET") {
        config.transport.socket_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("PANEL_CONNECT_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.transport.connect_timeout_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("PANEL_REQUEST_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.transport.request_timeout_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(provider) = env("PANEL_PROVIDER") {
        config.chat.default_provider = Some(provider);
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("PANEL_MODEL") {
        config.chat.default_model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(streaming) = env("PANEL_STREAMING") {
        config.chat.streaming = parse_flag(&streaming);
        config.source = ConfigSource::Env;
    }
    if let Some(debug) = env("PANEL_DEBUG") {
        config.chat.debug = parse_flag(&debug);
        config.source = ConfigSource::Env;
    }
    if let Some(capacity) = env("PANEL_RENDER_CACHE_CAPACITY").and_then(|v| v.parse::<usize>().ok()) {
        config.render_cache_capacity = capacity;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Socket path override
    pub socket_path: Option<PathBuf>,

    /// Provider override
    pub provider: Option<String>,

    /// Model override
    pub model: Option<String>,

    /// Streaming override
    pub streaming: Option<bool>,

    /// Debug override
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket path override
    #[must_use]
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = Some(path);
        self
    }

    /// Set provider override
    #[must_use]
    pub fn with_provider(mut self, provider: String) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set streaming override
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Set debug override
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.socket_path.is_none()
            && self.provider.is_none()
            && self.model.is_none()
            && self.streaming.is_none()
            && self.debug.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PanelConfig) {
        if self.is_empty() {
            return;
        }

        if let Some(ref path) = self.socket_path {
            config.transport.socket_path = Some(path.clone());
        }
        if let Some(ref provider) = self.provider {
            config.chat.default_provider = Some(provider.clone());
        }
        if let Some(ref model) = self.model {
            config.chat.default_model = Some(model.clone());
        }
        if let Some(streaming) = self.streaming {
            config.chat.streaming = streaming;
        }
        if let Some(debug) = self.debug {
            config.chat.debug = debug;
        }
        config.source = ConfigSource::Cli;
    }
}

// =============================================================================
// Tests
// =============================================================================
