// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! bazaar-sync - Real-time sync and optimistic reconciliation
//!
//! Keeps a marketplace UI consistent across sessions without waiting for the
//! server on every click: optimistic follow toggles reconciled against
//! authoritative deltas, chat with read receipts, live viewer counts, and an
//! idempotent rate-limited view counter.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types used by both sides
//!   - Messages, read receipts, follow responses and deltas
//!   - Realtime events, topic names, presence snapshots
//!   - Configuration and error types
//!
//! - **`channel`** - Topic-based broadcast
//!   - `Channel` trait and `ChannelHandle`
//!   - `Hub` (in-process) with presence membership
//!   - `LocalChannel` and `SseChannel` transports
//!
//! - **`client`** - Session-side flows
//!   - Optimistic controller and follow toggle
//!   - Chat room view with dedup and read receipts
//!   - Presence tracker
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum router, SQLite persistence via sqlx
//!   - Follow, chat, view-count and `/realtime` endpoints
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables `backend` and the server binary
//!
//! # Consistency model
//!
//! The database is the source of truth; the channel only makes sessions
//! converge faster. Nothing relies on channel ordering: appends are
//! deduplicated by id, read flags only move forward, presence counts are
//! recomputed from full snapshots, and follow deltas are applied
//! last-write-wins by server version.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bazaar_sync::client::{Config, FollowToggle, HttpApi, OptimisticController};
//!
//! # async fn example(target: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?.with_token("jwt");
//! let channel = config.channel();
//! let controller = OptimisticController::from_config(&config);
//! let api = Arc::new(HttpApi::new(config));
//!
//! let toggle = FollowToggle::open(&channel, api, controller, None, target).await?;
//! let outcome = toggle.toggle().await;
//! println!("{:?} -> {:?}", outcome, toggle.state());
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Broadcast channel abstraction
pub mod channel;

/// Client-side sync flows
pub mod client;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
