//! Hub-backed channel
//!
//! Used by code running in the same process as the [`Hub`]: the server itself,
//! single-process deployments and tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use crate::channel::sse::DEFAULT_HEARTBEAT;
use crate::channel::{Channel, ChannelError, ChannelHandle, Hub, Listeners};
use crate::shared::PresenceJoin;

/// [`Channel`] implementation over an in-process [`Hub`]
#[derive(Clone)]
pub struct LocalChannel {
    hub: Hub,
    heartbeat: Duration,
}

impl LocalChannel {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    /// Interval between presence heartbeats for handles opened from now on
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }
}

impl Channel for LocalChannel {
    async fn open(
        &self,
        topic: &str,
        presence: Option<PresenceJoin>,
        listeners: Listeners,
    ) -> Result<ChannelHandle, ChannelError> {
        // Subscribe before tracking so our own join snapshot is delivered.
        let mut rx = self.hub.subscribe(topic);
        let handle = ChannelHandle::new(topic, listeners.clone(), Arc::new(self.hub.clone()));

        let pump_topic = topic.to_string();
        handle.attach_task(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => listeners.dispatch(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Channel] {} lagged, skipped {} events", pump_topic, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        if let Some(join) = presence {
            let hub = self.hub.clone();
            let (beat_topic, key) = (topic.to_string(), join.key.clone());
            let guard = self.hub.track(topic, join);
            handle.attach_release(move || guard.release());

            let period = self.heartbeat;
            handle.attach_task(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if !hub.heartbeat(&beat_topic, &key) {
                        tracing::debug!("[Presence] {} no longer tracked on {}", key, beat_topic);
                    }
                }
            }));
        }

        Ok(handle)
    }
}
