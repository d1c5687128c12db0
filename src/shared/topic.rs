//! Topic naming
//!
//! Every broadcast address in the system is built and parsed here so that the
//! client flows and the server's access checks agree on the format.

use uuid::Uuid;

/// Parsed form of a topic name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// `room-<roomId>`: chat messages and read receipts
    Room(i64),
    /// `presence:<resourceKind>:<resourceId>`: viewers of a live resource
    Presence { kind: String, id: String },
    /// `follow:<userId>`: follow reconciliation deltas for one target user
    Follow(Uuid),
    /// Anything else; carried but never authorized beyond "signed in"
    Other(String),
}

impl Topic {
    /// Chat room topic name
    pub fn room(room_id: i64) -> String {
        format!("room-{}", room_id)
    }

    /// Presence topic name for a live resource
    pub fn presence(kind: &str, id: &str) -> String {
        format!("presence:{}:{}", kind, id)
    }

    /// Per-target follow reconciliation topic name
    pub fn follow(target_id: Uuid) -> String {
        format!("follow:{}", target_id)
    }

    /// Parse a topic name
    pub fn parse(name: &str) -> Self {
        if let Some(room_id) = name.strip_prefix("room-").and_then(|id| id.parse().ok()) {
            return Self::Room(room_id);
        }

        if let Some(rest) = name.strip_prefix("presence:") {
            if let Some((kind, id)) = rest.split_once(':') {
                if !kind.is_empty() && !id.is_empty() {
                    return Self::Presence {
                        kind: kind.to_string(),
                        id: id.to_string(),
                    };
                }
            }
        }

        if let Some(target) = name.strip_prefix("follow:").and_then(|id| Uuid::parse_str(id).ok()) {
            return Self::Follow(target);
        }

        Self::Other(name.to_string())
    }
}
