//! Listing view counter
//!
//! Gated by the throttle module so retries, refreshes and racing duplicate
//! requests count once per viewer per cooldown window.

pub mod cache;
pub mod db;
pub mod handlers;

pub use cache::ViewCountCache;
