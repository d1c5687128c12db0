//! Broadcast Channel Abstraction
//!
//! Thin wrapper over a topic-based publish/subscribe primitive. Everything that
//! needs to reach other sessions (chat fan-out, read receipts, follow deltas,
//! presence) goes through a [`ChannelHandle`] obtained from a [`Channel`].
//!
//! # Delivery
//!
//! Delivery is best-effort, unordered across peers and fire-and-forget:
//! [`ChannelHandle::send`] queues the event and returns. There is no
//! acknowledgement and no retry, and a subscriber that is mid-reconnect simply
//! misses the event. Consumers keep the database as the recoverable source of
//! truth and use the channel only to converge faster.
//!
//! # Module Structure
//!
//! ```text
//! channel/
//! ├── mod.rs    - Channel trait, ChannelHandle, Listeners
//! ├── hub.rs    - In-process topic registry with presence membership
//! ├── local.rs  - Channel backed by a Hub
//! └── sse.rs    - Channel backed by the server's /realtime endpoints
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bazaar_sync::channel::{Channel, Hub, Listeners, LocalChannel};
//!
//! # async fn example() -> Result<(), bazaar_sync::channel::ChannelError> {
//! let channel = LocalChannel::new(Hub::default());
//! let listeners = Listeners::new().on("message", |event| println!("{:?}", event.payload));
//! let handle = channel.open("room-1", None, listeners).await?;
//! handle.send("message", serde_json::json!({"id": 1}))?;
//! handle.close();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::shared::{EventType, PresenceJoin, RealtimeEvent};

/// In-process topic registry
pub mod hub;

/// Hub-backed channel
pub mod local;

/// Server-Sent Events channel
pub mod sse;

pub use hub::{Hub, PresenceGuard};
pub use local::LocalChannel;
pub use sse::SseChannel;

/// Errors raised while opening or using a channel handle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The handle was closed; nothing more can be sent on it
    #[error("channel '{0}' is closed")]
    Closed(String),
    /// The transport requires a signed-in viewer
    #[error("authentication required to join '{0}'")]
    Unauthenticated(String),
    /// The viewer may not join this topic
    #[error("not allowed to join '{0}'")]
    Forbidden(String),
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Event callback
pub type Callback = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Callbacks keyed by event name
///
/// Built before a topic is opened so that nothing emitted during the join
/// (in particular the first presence snapshot) is missed. More callbacks can
/// be added later through [`ChannelHandle::on`].
#[derive(Default, Clone)]
pub struct Listeners {
    by_event: Arc<Mutex<HashMap<String, Vec<Callback>>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `event` (builder form)
    pub fn on<F>(self, event: impl Into<EventType>, callback: F) -> Self
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.add(event.into(), Arc::new(callback));
        self
    }

    fn add(&self, event: EventType, callback: Callback) {
        let mut by_event = self.by_event.lock().unwrap_or_else(|e| e.into_inner());
        by_event
            .entry(event.as_str().to_string())
            .or_default()
            .push(callback);
    }

    /// Invoke every callback registered for the event's name
    pub fn dispatch(&self, event: &RealtimeEvent) {
        // Snapshot first so callbacks may register more listeners or send.
        let callbacks = {
            let by_event = self.by_event.lock().unwrap_or_else(|e| e.into_inner());
            by_event.get(event.event_type.as_str()).cloned()
        };

        match callbacks {
            Some(callbacks) => {
                for callback in callbacks {
                    callback(event);
                }
            }
            None => {
                tracing::trace!(
                    "[Channel] No listener for '{}' on {}",
                    event.event_type,
                    event.topic
                );
            }
        }
    }
}

/// Outbound half of a transport
pub trait Outbound: Send + Sync {
    /// Hand an event to the transport. Must not block on delivery.
    fn deliver(&self, event: RealtimeEvent) -> Result<(), ChannelError>;
}

/// Something that can open topics
pub trait Channel: Send + Sync {
    /// Subscribe to `topic`. With `presence` set the topic is opened in
    /// presence mode and the session key is tracked until the handle closes.
    fn open(
        &self,
        topic: &str,
        presence: Option<PresenceJoin>,
        listeners: Listeners,
    ) -> impl Future<Output = Result<ChannelHandle, ChannelError>> + Send;
}

/// An open subscription to one topic
///
/// Owned by whatever view or component opened it. Closing is idempotent and
/// happens automatically on drop, releasing both the event subscription and
/// any presence membership.
pub struct ChannelHandle {
    topic: String,
    listeners: Listeners,
    outbound: Arc<dyn Outbound>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    on_close: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    closed: AtomicBool,
}

impl ChannelHandle {
    pub(crate) fn new(topic: &str, listeners: Listeners, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            topic: topic.to_string(),
            listeners,
            outbound,
            tasks: Mutex::new(Vec::new()),
            on_close: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach a background task that is aborted on close
    pub(crate) fn attach_task(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }

    /// Attach cleanup that runs exactly once on close
    pub(crate) fn attach_release(&self, release: impl FnOnce() + Send + 'static) {
        self.on_close
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(release));
    }

    /// Topic this handle is subscribed to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Register a callback for `event`
    pub fn on<F>(&self, event: impl Into<EventType>, callback: F)
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.listeners.add(event.into(), Arc::new(callback));
    }

    /// Send an event to every subscriber of the topic (fire-and-forget)
    ///
    /// Only fails when the handle is already closed or the transport is gone;
    /// success says nothing about whether anyone received the event.
    pub fn send(
        &self,
        event: impl Into<EventType>,
        payload: serde_json::Value,
    ) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed(self.topic.clone()));
        }
        self.outbound
            .deliver(RealtimeEvent::new(self.topic.clone(), event, payload))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the handle. Safe to call any number of times.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let releases: Vec<_> = self
            .on_close
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for release in releases {
            release();
        }

        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }

        tracing::debug!("[Channel] Closed {}", self.topic);
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("topic", &self.topic)
            .field("closed", &self.is_closed())
            .finish()
    }
}
