/**
 * Real-time Event System
 *
 * This module defines the envelope that travels over every broadcast topic.
 * An event names the topic it was sent on, the event name subscribers match
 * against, and an opaque JSON payload whose shape depends on the event name.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of a real-time event
///
/// Serialized as its plain wire name (`"message"`, `"message_read"`, ...), so
/// unknown names survive a round trip as `Custom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Chat message envelope
    Message,
    /// Batch read receipt for a chat room
    MessageRead,
    /// Follow/unfollow reconciliation delta
    FollowDelta,
    /// Full presence membership snapshot
    PresenceSync,
    /// A session key entered the presence set
    PresenceJoin,
    /// A session key left the presence set
    PresenceLeave,
    /// Any other application-defined event
    Custom(String),
}

impl EventType {
    /// Wire name of this event
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::MessageRead => "message_read",
            Self::FollowDelta => "follow_delta",
            Self::PresenceSync => "presence_sync",
            Self::PresenceJoin => "presence_join",
            Self::PresenceLeave => "presence_leave",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Whether this event is emitted by the channel itself rather than a peer
    pub fn is_presence(&self) -> bool {
        matches!(
            self,
            Self::PresenceSync | Self::PresenceJoin | Self::PresenceLeave
        )
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "message" => Self::Message,
            "message_read" => Self::MessageRead,
            "follow_delta" => Self::FollowDelta,
            "presence_sync" => Self::PresenceSync,
            "presence_join" => Self::PresenceJoin,
            "presence_leave" => Self::PresenceLeave,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Real-time event delivered to every subscriber of a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    /// Topic the event was sent on
    pub topic: String,
    /// Event name
    pub event_type: EventType,
    /// Event payload (JSON-serializable data)
    pub payload: serde_json::Value,
    /// When the event was sent
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    /// Create a new real-time event stamped with the current time
    pub fn new(
        topic: impl Into<String>,
        event_type: impl Into<EventType>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Decode the payload into a concrete type
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::shared::SharedError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
