//! Presence tracker
//!
//! Joins a `presence:<kind>:<id>` topic and keeps a live count of distinct
//! session keys. The count is recomputed from the full snapshot carried by
//! every presence event; deltas are never accumulated, so a missed event only
//! delays convergence until the next one.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::channel::{Channel, ChannelError, ChannelHandle, Listeners};
use crate::shared::{EventType, PresenceJoin, PresencePayload, RealtimeEvent, Topic};

/// Entry point for joining presence topics
pub struct PresenceTracker;

impl PresenceTracker {
    /// Join the presence topic of `(kind, id)` as `session_key`
    pub async fn join<C: Channel + Clone>(
        channel: &C,
        resource: (&str, &str),
        session_key: impl Into<String>,
        meta: serde_json::Value,
    ) -> Result<PresenceSession<C>, ChannelError> {
        let (kind, id) = resource;
        let session = PresenceSession {
            channel: channel.clone(),
            topic: Topic::presence(kind, id),
            join: PresenceJoin::new(session_key).with_meta(meta),
            count: Arc::new(watch::channel(0).0),
            handle: Mutex::new(None),
        };
        session.rejoin().await?;
        Ok(session)
    }
}

/// One session's membership in a presence topic
pub struct PresenceSession<C> {
    channel: C,
    topic: String,
    join: PresenceJoin,
    count: Arc<watch::Sender<usize>>,
    handle: Mutex<Option<ChannelHandle>>,
}

fn recount(count: &watch::Sender<usize>, event: &RealtimeEvent) {
    match event.decode::<PresencePayload>() {
        Ok(payload) => {
            count.send_replace(payload.count());
        }
        Err(e) => tracing::warn!("[Presence] Malformed snapshot on {}: {}", event.topic, e),
    }
}

impl<C: Channel> PresenceSession<C> {
    fn handle(&self) -> MutexGuard<'_, Option<ChannelHandle>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listeners(&self) -> Listeners {
        let mut listeners = Listeners::new();
        for event in [EventType::PresenceSync, EventType::PresenceJoin, EventType::PresenceLeave] {
            let count = self.count.clone();
            listeners = listeners.on(event, move |event| recount(&count, event));
        }
        listeners
    }

    async fn rejoin(&self) -> Result<(), ChannelError> {
        let handle = self
            .channel
            .open(&self.topic, Some(self.join.clone()), self.listeners())
            .await?;

        let mut slot = self.handle();
        if slot.is_some() {
            // Joined concurrently; keep the existing membership.
            handle.close();
        } else {
            tracing::debug!("[Presence] {} joined {}", self.join.key, self.topic);
            *slot = Some(handle);
        }
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn session_key(&self) -> &str {
        &self.join.key
    }

    /// Current number of distinct sessions on the topic
    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    pub fn is_joined(&self) -> bool {
        self.handle().is_some()
    }

    /// Leave the topic. Safe to call any number of times.
    ///
    /// The count drops to zero until the session joins again; snapshots are
    /// not received while away.
    pub fn leave(&self) {
        let handle = self.handle().take();
        if let Some(handle) = handle {
            handle.close();
            tracing::debug!("[Presence] {} left {}", self.join.key, self.topic);
        }
        self.count.send_replace(0);
    }

    /// Hidden leaves; visible joins again with the same session key
    pub async fn set_visible(&self, visible: bool) -> Result<(), ChannelError> {
        if !visible {
            self.leave();
            return Ok(());
        }
        if self.is_joined() {
            return Ok(());
        }
        self.rejoin().await
    }
}

impl<C> Drop for PresenceSession<C> {
    fn drop(&mut self) {
        let handle = self.handle.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.close();
        }
    }
}
