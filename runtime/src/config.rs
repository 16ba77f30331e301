//! Middleware configuration.
//!
//! Defaults, overridden from the environment, then validated.
//!
//! | variable | field |
//! |---|---|
//! | `API_MIDDLEWARE_TIMEOUT_SECS` | `http.timeout_secs` |
//! | `API_MIDDLEWARE_CONNECT_TIMEOUT_SECS` | `http.connect_timeout_secs` |
//! | `API_MIDDLEWARE_USER_AGENT` | `http.user_agent` |
//! | `API_MIDDLEWARE_METRICS` | `metrics_enabled` |
//!
//! # Example
//!
//! ```no_run
//! use api_middleware_runtime::config::MiddlewareConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MiddlewareConfig::from_env()?;
//! println!("Request timeout: {:?}", config.http.timeout());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held an unparseable value
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
    /// The HTTP client could not be built from the configuration
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Whole-request timeout in seconds (0 disables it)
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// `User-Agent` sent with every request
    pub user_agent: String,
    /// Headers sent with every request; call headers win on conflict
    pub default_headers: BTreeMap<String, String>,
}

impl HttpTransportConfig {
    /// Whole-request timeout, `None` when disabled
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Connect timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate transport configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.timeout_secs != 0 && self.connect_timeout_secs > self.timeout_secs {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must not exceed timeout_secs".to_string(),
            ));
        }
        if self.user_agent.is_empty() {
            return Err(ConfigError::ValidationError("user_agent cannot be empty".to_string()));
        }
        for (name, value) in &self.default_headers {
            if http_header_invalid(name, value) {
                return Err(ConfigError::ValidationError(format!(
                    "invalid default header: {name}"
                )));
            }
        }
        Ok(())
    }
}

fn http_header_invalid(name: &str, value: &str) -> bool {
    reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err()
        || reqwest::header::HeaderValue::from_str(value).is_err()
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("api-middleware/{}", env!("CARGO_PKG_VERSION")),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Top-level middleware configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// HTTP transport settings
    pub http: HttpTransportConfig,
    /// Record call metrics through the `metrics` facade
    pub metrics_enabled: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            http: HttpTransportConfig::default(),
            metrics_enabled: true,
        }
    }
}

impl MiddlewareConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or validation fails
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or validation fails
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("API_MIDDLEWARE_TIMEOUT_SECS") {
            config.http.timeout_secs = parse_u64("API_MIDDLEWARE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("API_MIDDLEWARE_CONNECT_TIMEOUT_SECS") {
            config.http.connect_timeout_secs =
                parse_u64("API_MIDDLEWARE_CONNECT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("API_MIDDLEWARE_USER_AGENT") {
            config.http.user_agent = value;
        }
        if let Some(value) = lookup("API_MIDDLEWARE_METRICS") {
            config.metrics_enabled = parse_bool("API_MIDDLEWARE_METRICS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate entire configuration
    ///
    /// # Errors
    ///
    /// Returns error if any configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("{key} must be an integer, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseError(format!(
            "{key} must be a boolean, got {value:?}"
        ))),
    }
}
