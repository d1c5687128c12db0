//! Read-through cache for listing view totals
//!
//! Entries are invalidated, never updated in place, whenever a view counts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
pub struct ViewCountCache {
    entries: Arc<RwLock<HashMap<i64, i64>>>,
}

impl ViewCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, listing_id: i64) -> Option<i64> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&listing_id)
            .copied()
    }

    pub fn insert(&self, listing_id: i64, views: i64) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(listing_id, views);
    }

    pub fn invalidate(&self, listing_id: i64) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&listing_id);
    }
}
