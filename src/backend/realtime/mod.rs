//! Real-time Module
//!
//! HTTP face of the [`Hub`](crate::channel::Hub): remote clients subscribe to a
//! topic over Server-Sent Events and publish with plain POSTs. Access to each
//! topic is decided by [`access::authorize`].
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports
//! ├── access.rs       - Per-topic access rules
//! ├── live.rs         - LiveDirectory (is a resource live, who owns it)
//! ├── publish.rs      - Publish and heartbeat handlers
//! └── subscription.rs - SSE subscription handler
//! ```

pub mod access;
pub mod live;
pub mod publish;
pub mod subscription;

pub use live::{LiveDirectory, LiveStatus, StaticLiveDirectory};
