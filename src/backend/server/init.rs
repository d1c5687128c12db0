/**
 * Server Initialization
 *
 * 1. Connect to the database and apply migrations
 * 2. Create the topic hub
 * 3. Build `AppState` and the router around the caller's `LiveDirectory`
 * 4. Spawn the housekeeping task that prunes silent presence members and
 *    drops idle topics
 */
use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::backend::auth::JwtSecret;
use crate::backend::realtime::{LiveDirectory, LiveStatus, StaticLiveDirectory};
use crate::backend::routes::create_router;
use crate::backend::server::config::{connect_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::backend::views::ViewCountCache;
use crate::channel::Hub;

/// Errors that stop the server from starting
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::shared::ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Build application state from configuration
pub async fn create_state(
    config: ServerConfig,
    live: Arc<dyn LiveDirectory>,
) -> Result<AppState, StartupError> {
    config.validate()?;
    let db_pool = connect_database(&config.database_url).await?;
    tracing::info!("[Server] Database ready at {}", config.database_url);

    Ok(AppState {
        db_pool,
        hub: Hub::new(config.channel_capacity),
        jwt: JwtSecret::new(&config.jwt_secret),
        live,
        view_cache: ViewCountCache::new(),
        config: Arc::new(config),
    })
}

/// Periodically prune presence members that stopped heartbeating
pub fn spawn_housekeeping(hub: Hub, presence_timeout: Duration) -> tokio::task::JoinHandle<()> {
    let period = (presence_timeout / 3).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let pruned = hub.prune_stale(presence_timeout);
            hub.cleanup_inactive_topics();
            if pruned > 0 {
                tracing::info!("[Presence] Pruned {} stale sessions", pruned);
            }
            tracing::debug!("[Realtime] Housekeeping done, {} topics live", hub.topic_count());
        }
    })
}

/// In-memory live directory holding the resources declared in `config`
pub fn live_directory(config: &ServerConfig) -> StaticLiveDirectory {
    let directory = StaticLiveDirectory::new();
    for entry in &config.live {
        directory.set(
            &entry.kind,
            &entry.id,
            LiveStatus {
                is_live: entry.is_live,
                owner_id: entry.owner_id,
            },
        );
    }
    tracing::info!("[Server] {} live resources declared", config.live.len());
    directory
}

/// Create and configure the Axum application
///
/// `live` answers which presence resources are live and who owns them;
/// embedders pass their own directory, the binary passes [`live_directory`].
pub async fn create_app(config: ServerConfig, live: Arc<dyn LiveDirectory>) -> Result<Router<()>, StartupError> {
    tracing::info!("[Server] Initializing bazaar-sync backend");

    let state = create_state(config, live).await?;
    spawn_housekeeping(state.hub.clone(), state.config.presence_timeout);

    Ok(create_router(state))
}
