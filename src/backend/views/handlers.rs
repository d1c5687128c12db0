//! View Counter HTTP Handlers
//!
//! - `POST /listings/{id}/view` - record a view, at most one per viewer per cooldown
//! - `GET  /listings/{id}/views` - current total
//!
//! Signed-in viewers are keyed by user id, anonymous ones by the
//! `x-session-key` header. Requests carrying neither are answered without
//! counting.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use sqlx::SqlitePool;

use super::{cache::ViewCountCache, db};
use crate::backend::auth::Viewer;
use crate::backend::error::BackendError;
use crate::backend::server::config::ServerConfig;
use crate::backend::throttle::{self, ThrottleKey};
use crate::shared::ViewCount;

/// Header naming an anonymous viewer session
pub const SESSION_KEY_HEADER: &str = "x-session-key";

const TARGET_TYPE: &str = "listing";

fn actor_id(viewer: Viewer, headers: &HeaderMap) -> Option<String> {
    if let Some(id) = viewer.id() {
        return Some(format!("user:{}", id));
    }
    headers
        .get(SESSION_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| format!("session:{}", key))
}

async fn cached_views(pool: &SqlitePool, cache: &ViewCountCache, listing_id: i64) -> Result<i64, BackendError> {
    if let Some(views) = cache.get(listing_id) {
        return Ok(views);
    }
    let views = db::view_count(pool, listing_id)
        .await?
        .ok_or_else(|| BackendError::not_found(format!("Listing {} not found", listing_id)))?;
    cache.insert(listing_id, views);
    Ok(views)
}

/// Record a view (POST /listings/{id}/view)
pub async fn record_view(
    State(pool): State<SqlitePool>,
    State(cache): State<ViewCountCache>,
    State(config): State<Arc<ServerConfig>>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(listing_id): Path<i64>,
) -> Result<Json<ViewCount>, BackendError> {
    let views = cached_views(&pool, &cache, listing_id).await?;

    let Some(actor) = actor_id(viewer, &headers) else {
        tracing::debug!("[Views] Anonymous view of {} without session key", listing_id);
        return Ok(Json(ViewCount { listing_id, counted: false, views }));
    };

    let key = ThrottleKey::new(actor, TARGET_TYPE, listing_id);
    if !throttle::should_count(&pool, &key, config.view_cooldown).await? {
        return Ok(Json(ViewCount { listing_id, counted: false, views }));
    }

    let views = db::increment_views(&pool, listing_id)
        .await?
        .ok_or_else(|| BackendError::not_found(format!("Listing {} not found", listing_id)))?;
    cache.invalidate(listing_id);
    tracing::debug!("[Views] Listing {} now at {} views", listing_id, views);

    Ok(Json(ViewCount { listing_id, counted: true, views }))
}

/// Current total (GET /listings/{id}/views)
pub async fn get_views(
    State(pool): State<SqlitePool>,
    State(cache): State<ViewCountCache>,
    Path(listing_id): Path<i64>,
) -> Result<Json<ViewCount>, BackendError> {
    let views = cached_views(&pool, &cache, listing_id).await?;
    Ok(Json(ViewCount { listing_id, counted: false, views }))
}
