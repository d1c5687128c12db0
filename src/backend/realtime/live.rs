//! Live resource directory
//!
//! The realtime layer only needs two facts about a presence resource: whether
//! it is live right now and who owns it. Whatever runs the live-video side
//! implements [`LiveDirectory`]; [`StaticLiveDirectory`] is the in-memory
//! version used by the server binary and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStatus {
    pub is_live: bool,
    pub owner_id: Uuid,
}

/// Lookup of live resources by `(kind, id)`
pub trait LiveDirectory: Send + Sync {
    /// `None` when the resource is unknown
    fn status(&self, kind: &str, id: &str) -> Option<LiveStatus>;
}

#[derive(Debug, Default)]
pub struct StaticLiveDirectory {
    entries: RwLock<HashMap<(String, String), LiveStatus>>,
}

impl StaticLiveDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: &str, id: &str, status: LiveStatus) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((kind.to_string(), id.to_string()), status);
    }

    pub fn remove(&self, kind: &str, id: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(kind.to_string(), id.to_string()));
    }
}

impl LiveDirectory for StaticLiveDirectory {
    fn status(&self, kind: &str, id: &str) -> Option<LiveStatus> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind.to_string(), id.to_string()))
            .copied()
    }
}
