//! Backend Module
//!
//! Axum HTTP server for the sync layer: persistence endpoints for chat,
//! follows and view counts, plus the `/realtime` face of the topic hub.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs       - Module exports
//! ├── server/      - Configuration, state, initialization
//! ├── routes/      - Router assembly
//! ├── auth/        - JWT secret and the Viewer extractor
//! ├── chat/        - Room membership, messages, read receipts
//! ├── follow/      - Idempotent follow edges
//! ├── throttle/    - Idempotent rate-limited counter
//! ├── views/       - Listing view counter and cache
//! ├── realtime/    - SSE subscribe, publish, heartbeat, topic access
//! └── error/       - BackendError and its HTTP mapping
//! ```
//!
//! # Concurrency
//!
//! Requests are independent. Shared rows change only through conditional or
//! idempotent SQL (`ON CONFLICT DO NOTHING`, plain `DELETE`, guarded
//! `UPDATE`), so there is no application-level lock.

/// Server initialization and configuration
pub mod server;

/// HTTP route configuration
pub mod routes;

/// Viewer identity
pub mod auth;

/// Chat persistence and handlers
pub mod chat;

/// Follow edges
pub mod follow;

/// Rate-limited counter
pub mod throttle;

/// Listing view counts
pub mod views;

/// Real-time endpoints
pub mod realtime;

/// Backend error types
pub mod error;

pub use error::BackendError;
pub use server::{create_app, AppState, ServerConfig};
