/**
 * Server Configuration
 *
 * Configuration is read from environment variables (after `.env` has been
 * loaded by the binary), optionally overlaid by a TOML file whose path is
 * given in `BAZAAR_CONFIG`. Every value has a development default.
 *
 * | Variable                | Default           |
 * |-------------------------|-------------------|
 * | `DATABASE_URL`          | `sqlite::memory:` |
 * | `SERVER_PORT`           | `3000`            |
 * | `JWT_SECRET`            | development key   |
 * | `VIEW_COOLDOWN_SECS`    | `180`             |
 * | `PRESENCE_TIMEOUT_SECS` | `45`              |
 * | `CHANNEL_CAPACITY`      | `1000`            |
 *
 * The TOML file may also declare presence resources for the built-in live
 * directory:
 *
 * ```toml
 * [[live]]
 * kind = "stream"
 * id = "s-1"
 * owner_id = "6f1c0c8e-4d5a-4c8e-9b7a-2f0a1d3e5b6c"
 * ```
 */

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::shared::ConfigError;

const DEV_JWT_SECRET: &str = "bazaar-dev-secret-change-in-production";

/// Runtime configuration of the server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Minimum time between two counted views of one listing by one actor
    pub view_cooldown: Duration,
    /// Presence members silent for longer than this are pruned
    pub presence_timeout: Duration,
    /// Per-topic broadcast buffer
    pub channel_capacity: usize,
    /// Presence resources known at startup
    pub live: Vec<LiveEntry>,
}

/// A presence resource declared in the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveEntry {
    pub kind: String,
    pub id: String,
    pub owner_id: Uuid,
    #[serde(default = "default_is_live")]
    pub is_live: bool,
}

fn default_is_live() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 3000,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            view_cooldown: Duration::from_secs(180),
            presence_timeout: Duration::from_secs(45),
            channel_capacity: 1000,
            live: Vec::new(),
        }
    }
}

/// Optional overrides read from a TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    view_cooldown_secs: Option<u64>,
    presence_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
    #[serde(default)]
    live: Vec<LiveEntry>,
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            field: name,
            message: format!("cannot parse '{}'", value),
        }),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// Load from the environment, then apply `BAZAAR_CONFIG` if set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(port) = env_parse("SERVER_PORT")? {
            config.port = port;
        }
        match std::env::var("JWT_SECRET") {
            Ok(secret) => config.jwt_secret = secret,
            Err(_) => tracing::warn!("JWT_SECRET not set, using the development key"),
        }
        if let Some(secs) = env_parse("VIEW_COOLDOWN_SECS")? {
            config.view_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("PRESENCE_TIMEOUT_SECS")? {
            config.presence_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = env_parse("CHANNEL_CAPACITY")? {
            config.channel_capacity = capacity;
        }

        if let Ok(path) = std::env::var("BAZAAR_CONFIG") {
            config = config.with_file(Path::new(&path))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a TOML file
    pub fn with_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        let file: FileConfig =
            toml::from_str(&text).map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;

        if let Some(url) = file.database_url {
            self.database_url = url;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(secret) = file.jwt_secret {
            self.jwt_secret = secret;
        }
        if let Some(secs) = file.view_cooldown_secs {
            self.view_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = file.presence_timeout_secs {
            self.presence_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = file.channel_capacity {
            self.channel_capacity = capacity;
        }
        self.live.extend(file.live);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::MissingValue("DATABASE_URL"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("JWT_SECRET"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CHANNEL_CAPACITY",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.presence_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "PRESENCE_TIMEOUT_SECS",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Open the SQLite pool and run migrations
///
/// An in-memory database lives only as long as its connection, so it is
/// pinned to a single connection that never expires.
pub async fn connect_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(16)
    };

    let pool = pool_options.connect_with(options).await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    Ok(pool)
}
