//! Follow Module
//!
//! Idempotent follow/unfollow mutations over the `follow_edges` table.

/// Database operations
pub mod db;

/// HTTP handlers
pub mod handlers;
