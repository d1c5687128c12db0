//! Client configuration
//!
//! Wraps the shared [`AppConfig`] with the session's bearer token.

use std::time::Duration;

use crate::channel::SseChannel;
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Environment variable overriding the server URL
pub const API_URL_VAR: &str = "CLIENT_API_URL";

#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Config {
    pub fn new(app: AppConfig) -> Self {
        Self { app, token: None }
    }

    /// Defaults, with the server URL taken from `CLIENT_API_URL` when set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var(API_URL_VAR) {
            builder = builder.server_url(url);
        }
        Self::with_builder(builder)
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self::new(builder.build()?))
    }

    /// Set the JWT token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.app.server_url, path)
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    pub fn mutation_timeout(&self) -> Duration {
        self.app.mutation_timeout
    }

    /// Realtime channel against the configured server
    pub fn channel(&self) -> SseChannel {
        SseChannel::new(self.server_url(), self.token.clone())
    }
}
