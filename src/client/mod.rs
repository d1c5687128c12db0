//! Client Module
//!
//! Session-side flows that keep a UI in sync with the server and with other
//! sessions: optimistic toggles, chat with read receipts, and presence
//! counts. Every flow takes a [`Channel`](crate::channel::Channel) and one of
//! the API traits, so the same code runs against the real server
//! ([`HttpApi`] + [`SseChannel`](crate::channel::SseChannel)) and in-process.
//!
//! ```text
//! client/
//! ├── mod.rs         - Module exports
//! ├── config.rs      - Config (server URL, token, mutation timeout)
//! ├── api.rs         - API traits, HttpApi, MutationError
//! ├── optimistic.rs  - Generic optimistic toggle controller
//! ├── follow.rs      - FollowView and FollowToggle
//! ├── chat.rs        - ChatRoomView and ChatRoom
//! └── presence.rs    - PresenceTracker and PresenceSession
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod follow;
pub mod optimistic;
pub mod presence;

pub use api::{ChatApi, ClientError, FollowApi, HttpApi, MutationError};
pub use chat::{ChatRoom, ChatRoomView, ChatSnapshot, DeliveryStatus, ProvisionalMessage};
pub use config::Config;
pub use follow::{FollowState, FollowToggle, FollowView};
pub use optimistic::{OptimisticController, Settlement, ToggleCallbacks, ToggleMutation, ToggleOutcome};
pub use presence::{PresenceSession, PresenceTracker};
