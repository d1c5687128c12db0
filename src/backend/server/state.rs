/**
 * Application State Management
 *
 * `AppState` is the single router state. Handlers never take the whole
 * struct; each extracts only the parts it needs through the `FromRef`
 * implementations below (`State<SqlitePool>`, `State<Hub>`, ...).
 *
 * Every field is cheap to clone: the pool, hub and cache are handles around
 * shared inner state.
 */
use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::backend::auth::JwtSecret;
use crate::backend::realtime::LiveDirectory;
use crate::backend::server::config::ServerConfig;
use crate::backend::views::ViewCountCache;
use crate::channel::Hub;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub hub: Hub,
    pub jwt: JwtSecret,
    pub live: Arc<dyn LiveDirectory>,
    pub view_cache: ViewCountCache,
    pub config: Arc<ServerConfig>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Hub {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

/// Lets the `Viewer` extractor verify bearer tokens
impl FromRef<AppState> for JwtSecret {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt.clone()
    }
}

impl FromRef<AppState> for Arc<dyn LiveDirectory> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.live.clone()
    }
}

impl FromRef<AppState> for ViewCountCache {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.view_cache.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
