//! Presence payloads
//!
//! The channel attaches the full membership snapshot to every presence event,
//! so consumers can always recompute from the whole set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session key -> metadata supplied when the session joined
pub type PresenceState = BTreeMap<String, serde_json::Value>;

/// Payload of `presence_sync`, `presence_join` and `presence_leave`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PresencePayload {
    /// Session key that joined or left; `None` for a plain sync
    pub key: Option<String>,
    /// Full membership after the change
    pub state: PresenceState,
}

impl PresencePayload {
    /// Number of distinct session keys in the snapshot
    pub fn count(&self) -> usize {
        self.state.len()
    }
}

/// Presence-mode parameters for opening a topic
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceJoin {
    pub key: String,
    pub meta: serde_json::Value,
}

impl PresenceJoin {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}
