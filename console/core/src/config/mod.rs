//! TOML Configuration File Support
//!
//! Centralized configuration loading for the console, supporting a TOML file
//! at `~/.config/chat-console/console.toml`.
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
//! base_url = "http://localhost:8000"
//! request_timeout_secs = 120
//!
//! [generation]
//! max_tokens = 1000
//! temperature = 0.7
//! top_p = 0.9
//!
//! [session]
//! greeting = "Hello! How can I help?"
//! apology = "Sorry, I can't reply right now."
//! task_poll_interval_ms = 500
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::GenerationOptions;

/// Greeting shown when a session starts
pub const DEFAULT_GREETING: &str = "Hello! I'm your training assistant. I can help you manage \
     model training, monitor resource status and analyze performance data. How can I help you?";

/// Greeting shown after the history is cleared
pub const DEFAULT_CLEARED_GREETING: &str =
    "Conversation history cleared. Is there anything new I can help you with?";

/// Assistant text used when no reply could be obtained
pub const DEFAULT_APOLOGY: &str = "Sorry, I can't reply to your message right now. \
     Please check the backend service status or try again later.";

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

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the model-serving backend
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Generation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationToml {
    /// Maximum reply length in tokens
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Nucleus-sampling mass
    pub top_p: Option<f32>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Opening assistant turn
    pub greeting: Option<String>,

    /// Assistant turn after clearing history
    pub cleared_greeting: Option<String>,

    /// Assistant turn when no reply could be obtained
    pub apology: Option<String>,

    /// How often running inference tasks are polled
    pub task_poll_interval_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleToml {
    /// Backend section
    pub backend: BackendToml,

    /// Generation section
    pub generation: GenerationToml,

    /// Session section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved console configuration
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// Base URL of the model-serving backend
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Sampling options sent with every chat request
    pub generation: GenerationOptions,

    /// Opening assistant turn
    pub greeting: String,

    /// Assistant turn after clearing history
    pub cleared_greeting: String,

    /// Assistant turn when no reply could be obtained
    pub apology: String,

    /// How often running inference tasks are polled
    pub task_poll_interval: Duration,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(120),
            generation: GenerationOptions::default(),
            greeting: DEFAULT_GREETING.to_string(),
            cleared_greeting: DEFAULT_CLEARED_GREETING.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
            task_poll_interval: Duration::from_millis(500),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ConsoleConfig {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for out-of-range sampling
    /// values, a zero poll interval or an empty base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let GenerationOptions {
            temperature, top_p, ..
        } = self.generation;

        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature must be within [0, 1], got {temperature}"
            )));
        }
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ConfigError::ValidationError(format!(
                "top_p must be within [0, 1], got {top_p}"
            )));
        }
        if self.task_poll_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "task_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "base_url must not be empty".to_string(),
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
/// Returns `$XDG_CONFIG_HOME/chat-console/console.toml` or
/// `~/.config/chat-console/console.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chat-console").join("console.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are out of range. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<ConsoleConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting values are out of range.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ConsoleConfig, ConfigError> {
    let mut config = ConsoleConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConsoleToml = toml::from_str(&toml_content)?;
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

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ConsoleConfig, toml: &ConsoleToml) {
    if let Some(ref url) = toml.backend.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    if let Some(max_tokens) = toml.generation.max_tokens {
        config.generation.max_tokens = max_tokens;
    }
    if let Some(temperature) = toml.generation.temperature {
        config.generation.temperature = temperature;
    }
    if let Some(top_p) = toml.generation.top_p {
        config.generation.top_p = top_p;
    }

    if let Some(ref greeting) = toml.session.greeting {
        config.greeting.clone_from(greeting);
    }
    if let Some(ref greeting) = toml.session.cleared_greeting {
        config.cleared_greeting.clone_from(greeting);
    }
    if let Some(ref apology) = toml.session.apology {
        config.apology.clone_from(apology);
    }
    if let Some(ms) = toml.session.task_poll_interval_ms {
        config.task_poll_interval = Duration::from_millis(ms);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ConsoleConfig) {
    if let Ok(url) = std::env::var("CHAT_CONSOLE_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("CHAT_CONSOLE_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(max_tokens) = std::env::var("CHAT_CONSOLE_MAX_TOKENS") {
        if let Ok(n) = max_tokens.parse::<u32>() {
            config.generation.max_tokens = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(temperature) = std::env::var("CHAT_CONSOLE_TEMPERATURE") {
        if let Ok(t) = temperature.parse::<f32>() {
            config.generation.temperature = t;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(top_p) = std::env::var("CHAT_CONSOLE_TOP_P") {
        if let Ok(p) = top_p.parse::<f32>() {
            config.generation.top_p = p;
            config.source = ConfigSource::Env;
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

    /// Max tokens override
    pub max_tokens: Option<u32>,

    /// Temperature override
    pub temperature: Option<f32>,

    /// Top-p override
    pub top_p: Option<f32>,
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

    /// Set max tokens override
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature override
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p override
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override is out of range.
    pub fn apply(&self, config: &mut ConsoleConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some()
            || self.max_tokens.is_some()
            || self.temperature.is_some()
            || self.top_p.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.generation.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.generation.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            config.generation.top_p = top_p;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
