//! Database operations for chat rooms
//!
//! Messages are only ever inserted and have their read flag set; the read
//! flag is flipped with a conditional update so concurrent readers never
//! report the same message twice.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::shared::{Message, SenderSnapshot};

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn message_from_row(row: &SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        room_id: row.get("room_id"),
        payload: row.get("payload"),
        created_at: from_millis(row.get("created_at")),
        is_read: row.get("is_read"),
        sender: SenderSnapshot {
            id: row.get("sender_id"),
            username: row.get("username"),
            avatar: row.get("avatar"),
        },
    }
}

/// Create a chat room
pub async fn create_room(pool: &SqlitePool, name: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO chat_rooms (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(Utc::now().timestamp_millis())
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Add a member (or refresh their profile) in a room
pub async fn add_member(
    pool: &SqlitePool,
    room_id: i64,
    user_id: Uuid,
    username: &str,
    avatar: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO chat_room_members (room_id, user_id, username, avatar, joined_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (room_id, user_id) DO UPDATE SET username = excluded.username, avatar = excluded.avatar
        "#,
    )
    .bind(room_id)
    .bind(user_id)
    .bind(username)
    .bind(avatar)
    .bind(Utc::now().timestamp_millis())
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether a room exists
pub async fn room_exists(pool: &SqlitePool, room_id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM chat_rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Whether `user_id` may read and write `room_id`
pub async fn is_member(pool: &SqlitePool, room_id: i64, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT room_id FROM chat_room_members WHERE room_id = ? AND user_id = ?",
    )
    .bind(room_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Persist a message and return the full envelope
pub async fn insert_message(
    pool: &SqlitePool,
    room_id: i64,
    sender_id: Uuid,
    payload: &str,
) -> Result<Message, sqlx::Error> {
    let created_at = Utc::now().timestamp_millis();

    let result = sqlx::query(
        r#"
        INSERT INTO messages (room_id, sender_id, payload, created_at, is_read)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(room_id)
    .bind(sender_id)
    .bind(payload)
    .bind(created_at)
    .execute(pool)
    .await?;

    get_message(pool, result.last_insert_rowid())
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Fetch one message with its sender snapshot
pub async fn get_message(pool: &SqlitePool, message_id: i64) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT m.id, m.room_id, m.sender_id, m.payload, m.created_at, m.is_read,
               COALESCE(p.username, 'unknown') AS username, p.avatar AS avatar
        FROM messages m
        LEFT JOIN chat_room_members p ON p.room_id = m.room_id AND p.user_id = m.sender_id
        WHERE m.id = ?
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(message_from_row))
}

/// All messages of a room, oldest first
pub async fn list_messages(pool: &SqlitePool, room_id: i64) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.room_id, m.sender_id, m.payload, m.created_at, m.is_read,
               COALESCE(p.username, 'unknown') AS username, p.avatar AS avatar
        FROM messages m
        LEFT JOIN chat_room_members p ON p.room_id = m.room_id AND p.user_id = m.sender_id
        WHERE m.room_id = ?
        ORDER BY m.created_at ASC, m.id ASC
        "#,
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(message_from_row).collect())
}

/// Mark every unread message in the room not authored by `reader_id` as read
///
/// Returns the ids this call flipped, in ascending order. A message already
/// read (by this or a concurrent call) is never returned again.
pub async fn mark_room_read(
    pool: &SqlitePool,
    room_id: i64,
    reader_id: Uuid,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut ids: Vec<i64> = sqlx::query_scalar(
        r#"
        UPDATE messages
        SET is_read = 1
        WHERE room_id = ? AND sender_id != ? AND is_read = 0
        RETURNING id
        "#,
    )
    .bind(room_id)
    .bind(reader_id)
    .fetch_all(pool)
    .await?;

    ids.sort_unstable();
    Ok(ids)
}
