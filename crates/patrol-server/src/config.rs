//! Application configuration.

use std::collections::HashSet;
use std::path::Path;

use patrol_core::{Role, DEFAULT_ROUTE_THRESHOLD};
use patrol_hub::HubConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Route adherence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Per-axis deviation allowed from a waypoint, in degrees.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_ROUTE_THRESHOLD
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// One bearer token and the identity it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// Bearer tokens accepted by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load from the default path, falling back to built-in defaults.
    pub fn load() -> AppResult<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if !self.route.threshold.is_finite() || self.route.threshold < 0.0 {
            return Err(AppError::Config(format!(
                "route.threshold must be a non-negative number, got {}",
                self.route.threshold
            )));
        }
        if self.hub.observer_buffer == 0 {
            return Err(AppError::Config("hub.observer_buffer must be at least 1".into()));
        }
        if self.hub.send_timeout_ms == 0 {
            return Err(AppError::Config("hub.send_timeout_ms must be at least 1".into()));
        }
        if self.hub.write_timeout_ms == 0 {
            return Err(AppError::Config("hub.write_timeout_ms must be at least 1".into()));
        }
        if self.hub.max_observers == 0 {
            return Err(AppError::Config("hub.max_observers must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.auth.tokens {
            if entry.token.is_empty() {
                return Err(AppError::Config(format!(
                    "empty token configured for user '{}'",
                    entry.username
                )));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate token configured for user '{}'",
                    entry.username
                )));
            }
        }
        Ok(())
    }
}
