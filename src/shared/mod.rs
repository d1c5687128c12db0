//! Shared Module
//!
//! This module contains types that are shared between the client flows and the
//! backend: event envelopes, topic names, message and follow shapes, and
//! configuration. All types are designed for serialization and transmission
//! over HTTP and the broadcast channel.

/// Chat message data structures
pub mod message;

/// Real-time event envelope
pub mod event;

/// Topic naming
pub mod topic;

/// Follow graph types
pub mod follow;

/// Presence payloads
pub mod presence;

/// View counter types
pub mod views;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use message::{Message, ReadReceipt, SendMessageRequest, SenderSnapshot};
pub use event::{EventType, RealtimeEvent};
pub use topic::Topic;
pub use follow::{FollowCounts, FollowDelta, FollowStatus, FollowToggleResponse};
pub use presence::{PresenceJoin, PresencePayload, PresenceState};
pub use views::ViewCount;
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
