//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, from a TOML file at
//! `~/.config/ragchat/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:5000/api"
//! user_id = "guest"
//! bearer_token = "eyJhbGciOi..."
//! request_timeout_secs = 120
//! connect_timeout_ms = 5000
//!
//! [stream]
//! initial_status = "Initializing..."
//! max_sources_shown = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default service address for local development
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// User id sent when none is configured
pub const GUEST_USER_ID: &str = "guest";

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

/// Tracks where a configuration value came from
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

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Base URL of the RAG service, including the `/api` prefix
    pub base_url: Option<String>,

    /// Value of the `X-User-ID` header
    pub user_id: Option<String>,

    /// Bearer token for the `Authorization` header
    pub bearer_token: Option<String>,

    /// Timeout for non-streaming requests in seconds
    pub request_timeout_secs: Option<u64>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Streaming section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Status shown on the assistant placeholder before the first frame
    pub initial_status: Option<String>,

    /// Citations listed per answer before collapsing into "+N more"
    pub max_sources_shown: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// API configuration section
    pub api: ApiToml,

    /// Streaming configuration section
    pub stream: StreamToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Connection settings for the RAG service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// `X-User-ID` header value
    pub user_id: String,
    /// Bearer token, if authenticated
    pub bearer_token: Option<String>,
    /// Timeout for non-streaming requests
    pub request_timeout: Duration,
    /// Connection timeout (applies to the ask stream too)
    pub connect_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            user_id: GUEST_USER_ID.to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

impl ApiConfig {
    /// Settings for a service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }
}

/// Settings for answer streaming
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Status shown before the first frame arrives
    pub initial_status: String,
    /// Citations listed per answer
    pub max_sources_shown: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_status: "Initializing...".to_string(),
            max_sources_shown: 5,
        }
    }
}

/// Centralized client configuration
///
/// Use [`load_config`] to load with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Service connection settings
    pub api: ApiConfig,

    /// Streaming settings
    pub stream: StreamConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            stream: StreamConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
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

    /// Check values that would only fail later at request time
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.api.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must start with http:// or https:// (got {url:?})"
            )));
        }
        if self.api.user_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.user_id must not be empty".to_string(),
            ));
        }
        if self.api.request_timeout.is_zero() || self.api.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "api timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ragchat/config.toml` or
/// `~/.config/ragchat/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ragchat").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults plus the TOML file, without environment overrides
fn load_file_config(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.api.base_url {
        config.api.base_url = normalize_base_url(url.clone());
    }
    if let Some(ref user_id) = toml.api.user_id {
        config.api.user_id.clone_from(user_id);
    }
    if toml.api.bearer_token.is_some() {
        config.api.bearer_token.clone_from(&toml.api.bearer_token);
    }
    if let Some(secs) = toml.api.request_timeout_secs {
        config.api.request_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.api.connect_timeout_ms {
        config.api.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(ref status) = toml.stream.initial_status {
        config.stream.initial_status.clone_from(status);
    }
    if let Some(max) = toml.stream.max_sources_shown {
        config.stream.max_sources_shown = max;
    }
}

/// Apply environment variable overrides to the config
///
/// `lookup` resolves a variable name; production passes `std::env::var`.
fn apply_env_config<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("RAGCHAT_API_URL") {
        config.api.base_url = normalize_base_url(url);
        config.source = ConfigSource::Env;
    }
    if let Some(user_id) = lookup("RAGCHAT_USER_ID") {
        config.api.user_id = user_id;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup("RAGCHAT_TOKEN") {
        config.api.bearer_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("RAGCHAT_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.api.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring non-numeric RAGCHAT_TIMEOUT_SECS");
        }
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
    /// Base URL override
    pub base_url: Option<String>,

    /// User id override
    pub user_id: Option<String>,

    /// Bearer token override
    pub bearer_token: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set user id override
    #[must_use]
    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set bearer token override
    #[must_use]
    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = Some(token);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.base_url.is_some() || self.user_id.is_some() || self.bearer_token.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.api.base_url = normalize_base_url(url.clone());
        }
        if let Some(ref user_id) = self.user_id {
            config.api.user_id.clone_from(user_id);
        }
        if self.bearer_token.is_some() {
            config.api.bearer_token.clone_from(&self.bearer_token);
        }
    }
}
