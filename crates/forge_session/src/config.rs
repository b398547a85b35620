//! Runtime configuration.
//!
//! Configuration is read from an optional TOML file and then overridden from
//! `FORGE_*` environment variables. Every field has a default, so an empty
//! file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

pub const ENV_ENVIRONMENT: &str = "FORGE_ENV";
pub const ENV_API_BASE_URL: &str = "FORGE_API_BASE_URL";
pub const ENV_API_TIMEOUT_MS: &str = "FORGE_API_TIMEOUT_MS";
pub const ENV_CHAT_WINDOW_SECS: &str = "FORGE_CHAT_WINDOW_SECS";
pub const ENV_ENABLE_LOGGING: &str = "FORGE_ENABLE_LOGGING";
pub const ENV_ENABLE_ERROR_REPORTING: &str = "FORGE_ENABLE_ERROR_REPORTING";
pub const ENV_ENABLE_PERFORMANCE_MONITORING: &str = "FORGE_ENABLE_PERFORMANCE_MONITORING";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Deployment environment, recorded in session metadata
    pub environment: String,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub features: FeatureFlags,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

impl ForgeConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load an optional file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> SessionResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `FORGE_*` overrides from `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            self.environment = env;
        }
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api.base_url = url;
        }
        if let Some(value) = lookup(ENV_API_TIMEOUT_MS) {
            self.api.timeout_ms = parse_number(ENV_API_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_CHAT_WINDOW_SECS) {
            self.session.chat_window_secs = parse_number(ENV_CHAT_WINDOW_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_ENABLE_LOGGING) {
            self.features.enable_logging = parse_flag(ENV_ENABLE_LOGGING, &value)?;
        }
        if let Some(value) = lookup(ENV_ENABLE_ERROR_REPORTING) {
            self.features.enable_error_reporting = parse_flag(ENV_ENABLE_ERROR_REPORTING, &value)?;
        }
        if let Some(value) = lookup(ENV_ENABLE_PERFORMANCE_MONITORING) {
            self.features.enable_performance_monitoring =
                parse_flag(ENV_ENABLE_PERFORMANCE_MONITORING, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(SessionError::Config("api.base_url must not be empty".into()));
        }
        if self.session.countdown_tick_ms == 0 || self.session.progress_tick_ms == 0 {
            return Err(SessionError::Config("tick intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }
}

/// API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 120_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Timer settings for the session machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Soft deadline for the chat request, in countdown ticks
    pub chat_window_secs: u32,
    pub countdown_tick_ms: u64,
    pub progress_tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chat_window_secs: 60,
            countdown_tick_ms: 1000,
            progress_tick_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn chat_window_secs(mut self, secs: u32) -> Self {
        self.chat_window_secs = secs;
        self
    }

    pub fn countdown_tick_ms(mut self, ms: u64) -> Self {
        self.countdown_tick_ms = ms;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.progress_tick_ms = ms;
        self
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(1))
    }
}

/// Feature toggles for the ambient services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_logging: bool,
    pub enable_error_reporting: bool,
    pub enable_performance_monitoring: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_logging: true,
            enable_error_reporting: true,
            enable_performance_monitoring: true,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SessionResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SessionError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> SessionResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SessionError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}
