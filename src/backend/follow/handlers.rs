//! Follow HTTP Handlers
//!
//! - `POST   /follow/{target}` - follow (idempotent)
//! - `DELETE /follow/{target}` - unfollow (idempotent)
//! - `GET    /follow/{target}` - relationship status and counts
//!
//! Mutations answer with the authoritative delta (`+1`, `-1`, or `0` when the
//! edge already matched) so the client can tell whether its optimistic guess
//! held, plus a version the client uses to order reconciliation events.

use std::sync::atomic::{AtomicI64, Ordering};

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::db;
use crate::backend::auth::Viewer;
use crate::backend::error::BackendError;
use crate::shared::{FollowStatus, FollowToggleResponse, SharedError};

static LAST_VERSION: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing version stamp, based on wall-clock microseconds
pub fn next_version() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_VERSION.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_VERSION.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

fn reject_self_follow(viewer_id: Uuid, target_id: Uuid) -> Result<(), BackendError> {
    if viewer_id == target_id {
        return Err(SharedError::validation("target", "Cannot follow yourself").into());
    }
    Ok(())
}

/// Apply the edge change and stamp it in one transaction
///
/// The version is taken while the write lock is held, so versions order the
/// writes and the response carrying the highest version matches the stored
/// edge.
async fn toggle_edge(
    pool: &SqlitePool,
    viewer_id: Uuid,
    target_id: Uuid,
    follow: bool,
) -> Result<FollowToggleResponse, BackendError> {
    reject_self_follow(viewer_id, target_id)?;

    let mut tx = pool.begin().await?;
    let changed = if follow {
        db::follow(&mut *tx, viewer_id, target_id).await?
    } else {
        db::unfollow(&mut *tx, viewer_id, target_id).await?
    };
    let counts = db::counts(&mut *tx, target_id).await?;
    let version = next_version();
    tx.commit().await?;

    let delta = match (changed, follow) {
        (false, _) => 0,
        (true, true) => 1,
        (true, false) => -1,
    };
    Ok(FollowToggleResponse {
        delta,
        is_following: follow,
        counts: Some(counts),
        version,
    })
}

/// Follow a user (POST /follow/{target})
pub async fn follow(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(target_id): Path<Uuid>,
) -> Result<Json<FollowToggleResponse>, BackendError> {
    let viewer_id = viewer.require()?;
    let response = toggle_edge(&pool, viewer_id, target_id, true).await?;
    tracing::info!("[Follow] {} -> {} (delta={})", viewer_id, target_id, response.delta);
    Ok(Json(response))
}

/// Unfollow a user (DELETE /follow/{target})
pub async fn unfollow(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(target_id): Path<Uuid>,
) -> Result<Json<FollowToggleResponse>, BackendError> {
    let viewer_id = viewer.require()?;
    let response = toggle_edge(&pool, viewer_id, target_id, false).await?;
    tracing::info!("[Follow] {} -/-> {} (delta={})", viewer_id, target_id, response.delta);
    Ok(Json(response))
}

/// Relationship status (GET /follow/{target})
pub async fn status(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(target_id): Path<Uuid>,
) -> Result<Json<FollowStatus>, BackendError> {
    let is_following = match viewer.id() {
        Some(viewer_id) => db::is_following(&pool, viewer_id, target_id).await?,
        None => false,
    };

    Ok(Json(FollowStatus {
        target_id,
        is_following,
        counts: db::counts(&pool, target_id).await?,
    }))
}
