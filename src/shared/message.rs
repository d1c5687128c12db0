/**
 * Chat Message Types
 *
 * Wire and storage shapes for chat messages and read receipts. A message's
 * `is_read` flag only ever moves from `false` to `true`.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::SharedError;

/// Longest accepted message payload, in characters
pub const MAX_PAYLOAD_CHARS: usize = 2000;

/// Snapshot of the sender carried inside every message envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SenderSnapshot {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

/// A chat message as persisted and as broadcast in a `message` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id; negative ids are provisional local entries
    pub id: i64,
    pub room_id: i64,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub sender: SenderSnapshot,
}

impl Message {
    /// Id of the author
    pub fn sender_id(&self) -> Uuid {
        self.sender.id
    }

    /// Flip the read flag on. Never clears it.
    pub fn mark_read(&mut self) {
        self.is_read = true;
    }

    /// Ordering key within a room
    pub fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Body of `POST /chat-room/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub payload: String,
}

impl SendMessageRequest {
    /// Reject malformed input before it reaches persistence
    pub fn validate(&self) -> Result<(), SharedError> {
        validate_payload(&self.payload)
    }
}

/// Validate a message payload
pub fn validate_payload(payload: &str) -> Result<(), SharedError> {
    if payload.trim().is_empty() {
        return Err(SharedError::validation("payload", "Message cannot be empty"));
    }
    if payload.chars().count() > MAX_PAYLOAD_CHARS {
        return Err(SharedError::validation(
            "payload",
            format!("Message exceeds {} characters", MAX_PAYLOAD_CHARS),
        ));
    }
    Ok(())
}

/// Response of `POST /chat-room/{id}/mark-read`, also the `message_read` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadReceipt {
    pub read_ids: Vec<i64>,
}
