//! Application configuration module
//!
//! Provides the configuration shared by every client session: where the
//! server lives and how long a mutation may stay in flight.

use std::time::Duration;

use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Default upper bound on a single mutation round trip
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server URL
    pub server_url: String,
    /// Time after which an unanswered mutation is rolled back
    pub mutation_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            mutation_timeout: DEFAULT_MUTATION_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.mutation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "mutation_timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    mutation_timeout: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the mutation timeout
    pub fn mutation_timeout(mut self, timeout: Duration) -> Self {
        self.mutation_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self
                .server_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.server_url),
            mutation_timeout: self.mutation_timeout.unwrap_or(defaults.mutation_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to read config file: {0}")]
    File(String),
}
