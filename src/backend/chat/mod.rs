//! Chat Module
//!
//! Server side of the chat messaging protocol: room membership, message
//! persistence and batch read-marking.
//!
//! ```text
//! chat/
//! ├── mod.rs      - Module exports
//! ├── db.rs       - SQL for rooms, members and messages
//! └── handlers.rs - HTTP handlers
//! ```

/// Database operations
pub mod db;

/// HTTP handlers
pub mod handlers;
