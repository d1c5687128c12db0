//! Chat HTTP Handlers
//!
//! Persistence side of the chat protocol. Fan-out is done by the clients on
//! the `room-<id>` topic once these calls succeed; the handlers only persist,
//! list and mark read.
//!
//! - `POST /chat-room/{id}/messages` - persist a message
//! - `GET  /chat-room/{id}/messages` - full history, oldest first
//! - `POST /chat-room/{id}/mark-read` - flip unread messages from others

use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::db;
use crate::backend::auth::Viewer;
use crate::backend::error::BackendError;
use crate::shared::{Message, ReadReceipt, SendMessageRequest};

/// Resolve the viewer and check they belong to the room
async fn require_member(pool: &SqlitePool, room_id: i64, viewer: Viewer) -> Result<Uuid, BackendError> {
    let user_id = viewer.require()?;

    if !db::room_exists(pool, room_id).await? {
        return Err(BackendError::not_found(format!("Room {} not found", room_id)));
    }
    if !db::is_member(pool, room_id, user_id).await? {
        tracing::warn!("[Chat] {} is not a member of room {}", user_id, room_id);
        return Err(BackendError::forbidden("Not a member of this room"));
    }

    Ok(user_id)
}

/// Persist a message (POST /chat-room/{id}/messages)
pub async fn send_message(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(room_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, BackendError> {
    let sender_id = viewer.require()?;
    request.validate()?;
    require_member(&pool, room_id, Viewer(Some(sender_id))).await?;

    let message = db::insert_message(&pool, room_id, sender_id, &request.payload).await?;
    tracing::info!("[Chat] Message {} persisted in room {}", message.id, room_id);

    Ok(Json(message))
}

/// Message history (GET /chat-room/{id}/messages)
pub async fn list_messages(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<Message>>, BackendError> {
    require_member(&pool, room_id, viewer).await?;
    Ok(Json(db::list_messages(&pool, room_id).await?))
}

/// Batch read-mark (POST /chat-room/{id}/mark-read)
pub async fn mark_read(
    State(pool): State<SqlitePool>,
    viewer: Viewer,
    Path(room_id): Path<i64>,
) -> Result<Json<ReadReceipt>, BackendError> {
    let reader_id = require_member(&pool, room_id, viewer).await?;

    let read_ids = db::mark_room_read(&pool, room_id, reader_id).await?;
    if !read_ids.is_empty() {
        tracing::debug!("[Chat] {} marked {} messages read in room {}", reader_id, read_ids.len(), room_id);
    }

    Ok(Json(ReadReceipt { read_ids }))
}
