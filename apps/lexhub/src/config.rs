//! # Application Configuration
//!
//! `lexhub.toml` plus `LEXHUB_*` environment overrides.
//!
//! ```toml
//! default_role = "client"
//!
//! [hub]
//! namespace = "hub"
//! default_ttl_secs = 300
//! default_page_size = 25
//! real_time_sync = false
//! predictive_loading = true
//!
//! [context]
//! preference_capacity = 1024
//! context_capacity = 4096
//! behavior_window = 20
//!
//! [server]
//! api_key = "secret"
//! rate_limit = 100
//! cors_origins = "http://localhost:3000"
//!
//! [users]
//! u-attorney = "attorney"
//! ```
//!
//! A missing file is not an error: defaults apply, then the environment.

use lexhub_core::HubConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Role given to users absent from `[users]`.
pub const DEFAULT_ROLE: &str = "client";

/// Configuration failures. Only raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Context Provider bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Users whose preferences stay materialized.
    pub preference_capacity: usize,
    /// (user, module) context entries kept.
    pub context_capacity: usize,
    /// Recent visits remembered per user for prediction.
    pub behavior_window: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            preference_capacity: 1024,
            context_capacity: 4096,
            behavior_window: 20,
        }
    }
}

/// HTTP server security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bearer key required on every route but `/health` when set.
    pub api_key: Option<String>,
    /// Requests per second, 0 disables limiting.
    pub rate_limit: u32,
    /// `*` or a comma-separated origin list. Localhost only when unset.
    pub cors_origins: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: 100,
            cors_origins: None,
        }
    }
}

/// Everything the binary reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexhubConfig {
    pub hub: HubConfig,
    pub context: ContextSettings,
    pub server: ServerSettings,
    /// User id to role.
    pub users: BTreeMap<String, String>,
    pub default_role: String,
}

impl Default for LexhubConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            context: ContextSettings::default(),
            server: ServerSettings::default(),
            users: BTreeMap::new(),
            default_role: DEFAULT_ROLE.to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl LexhubConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a TOML file. A file that does not exist yields defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// File, then process environment, then validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LEXHUB_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("LEXHUB_DEFAULT_TTL") {
            self.hub.default_ttl_secs = parse_env("LEXHUB_DEFAULT_TTL", &v)?;
        }
        if let Some(v) = lookup("LEXHUB_PAGE_SIZE") {
            self.hub.default_page_size = parse_env("LEXHUB_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("LEXHUB_PREDICTIVE_LOADING") {
            self.hub.predictive_loading = parse_env("LEXHUB_PREDICTIVE_LOADING", &v)?;
        }
        if let Some(v) = lookup("LEXHUB_REALTIME_SYNC") {
            self.hub.real_time_sync = parse_env("LEXHUB_REALTIME_SYNC", &v)?;
        }
        if let Some(v) = lookup("LEXHUB_CACHE_NAMESPACE") {
            self.hub.namespace = v;
        }
        if let Some(v) = lookup("LEXHUB_API_KEY") {
            self.server.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = lookup("LEXHUB_RATE_LIMIT") {
            self.server.rate_limit = parse_env("LEXHUB_RATE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("LEXHUB_CORS_ORIGINS") {
            self.server.cors_origins = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "hub.default_page_size cannot be 0".to_string(),
            ));
        }
        if self.hub.namespace.is_empty()
            || self
                .hub
                .namespace
                .contains(lexhub_core::primitives::RESERVED_NAME_CHARS)
        {
            return Err(ConfigError::Invalid(format!(
                "hub.namespace '{}' is empty or contains a reserved character",
                self.hub.namespace
            )));
        }
        if self.context.preference_capacity == 0 || self.context.context_capacity == 0 {
            return Err(ConfigError::Invalid(
                "context capacities cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
