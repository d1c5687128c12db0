/**
 * In-process Topic Hub
 *
 * One `tokio::sync::broadcast` sender per topic, created lazily on first use,
 * plus presence membership for topics opened in presence mode.
 *
 * # Presence
 *
 * Membership is keyed by session key. Several connections may share a key
 * (two tabs of one session) and the key stays present until the last of them
 * goes away. Every change broadcasts a `presence_join` or `presence_leave`
 * followed by a `presence_sync`, and all three carry the full snapshot.
 *
 * Members that stop heartbeating are removed by `prune_stale`, which the
 * server runs on an interval. Consumers never see anything but snapshots, so
 * a crashed session simply disappears from the next one. A pruned member
 * whose connection is still open is parked as dormant and comes back on its
 * next heartbeat; it is forgotten only when that connection closes.
 */
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::channel::{ChannelError, Outbound};
use crate::shared::{EventType, PresenceJoin, PresencePayload, PresenceState, RealtimeEvent};

/// Default per-topic buffer
pub const DEFAULT_CAPACITY: usize = 1000;

/// Shared topic registry; cheap to clone
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    topics: Mutex<HashMap<String, TopicState>>,
    capacity: usize,
    next_connection: AtomicU64,
}

struct TopicState {
    sender: broadcast::Sender<RealtimeEvent>,
    members: HashMap<String, Member>,
    /// Pruned members whose connections are still held
    dormant: HashMap<String, Member>,
}

struct Member {
    meta: serde_json::Value,
    connections: HashSet<u64>,
    last_seen: Instant,
}

impl TopicState {
    fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
            members: HashMap::new(),
            dormant: HashMap::new(),
        }
    }

    fn snapshot(&self) -> PresenceState {
        self.members
            .iter()
            .map(|(key, member)| (key.clone(), member.meta.clone()))
            .collect()
    }

    /// Broadcast a bare sync with the full state
    fn sync(&self, topic: &str) {
        let sync = PresencePayload { key: None, state: self.snapshot() };
        let payload = serde_json::to_value(&sync).unwrap_or_default();
        let _ = self
            .sender
            .send(RealtimeEvent::new(topic, EventType::PresenceSync, payload));
    }

    /// Broadcast `change` (join/leave) then a sync, both with the full state
    fn announce(&self, topic: &str, change: EventType, key: &str) {
        let state = self.snapshot();
        let changed = PresencePayload {
            key: Some(key.to_string()),
            state: state.clone(),
        };
        let sync = PresencePayload { key: None, state };

        for (event_type, payload) in [(change, changed), (EventType::PresenceSync, sync)] {
            let payload = serde_json::to_value(&payload).unwrap_or_default();
            // No receivers is fine; presence is recomputed on the next snapshot.
            let _ = self
                .sender
                .send(RealtimeEvent::new(topic, event_type, payload));
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Hub {
    /// Create a hub whose topics buffer up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                topics: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, TopicState>> {
        self.inner.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to a topic, creating it if needed
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<RealtimeEvent> {
        let capacity = self.inner.capacity;
        self.topics()
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(capacity))
            .sender
            .subscribe()
    }

    /// Broadcast an event to every subscriber of its topic
    ///
    /// Returns the number of receivers the event was handed to (0 if none).
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let topics = self.topics();
        let Some(state) = topics.get(&event.topic) else {
            tracing::debug!("[Realtime] No subscribers on {}", event.topic);
            return 0;
        };

        match state.sender.send(event) {
            Ok(count) => {
                tracing::debug!("[Realtime] Event broadcast to {} subscribers", count);
                count
            }
            Err(e) => {
                tracing::debug!("[Realtime] No subscribers to receive event: {:?}", e.0.event_type);
                0
            }
        }
    }

    /// Start tracking a session key on a presence topic
    ///
    /// The membership lives as long as the returned guard.
    pub fn track(&self, topic: &str, join: PresenceJoin) -> PresenceGuard {
        let connection = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let capacity = self.inner.capacity;

        let mut topics = self.topics();
        let state = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(capacity));

        let member = state
            .members
            .entry(join.key.clone())
            .or_insert_with(|| Member {
                meta: join.meta.clone(),
                connections: HashSet::new(),
                last_seen: Instant::now(),
            });
        let first = member.connections.is_empty();
        member.connections.insert(connection);
        if let Some(parked) = state.dormant.remove(&join.key) {
            member.connections.extend(parked.connections);
        }
        member.meta = join.meta;
        member.last_seen = Instant::now();

        if first {
            tracing::info!("[Presence] {} joined {}", join.key, topic);
            state.announce(topic, EventType::PresenceJoin, &join.key);
        } else {
            // Membership unchanged, but the new connection still needs a snapshot.
            tracing::debug!("[Presence] Extra connection for {} on {}", join.key, topic);
            state.sync(topic);
        }

        PresenceGuard {
            hub: self.clone(),
            topic: topic.to_string(),
            key: join.key,
            connection,
            released: false,
        }
    }

    fn untrack(&self, topic: &str, key: &str, connection: u64) {
        let mut topics = self.topics();
        let Some(state) = topics.get_mut(topic) else {
            return;
        };
        if let Some(parked) = state.dormant.get_mut(key) {
            parked.connections.remove(&connection);
            if parked.connections.is_empty() {
                state.dormant.remove(key);
            }
        }
        let Some(member) = state.members.get_mut(key) else {
            return;
        };

        member.connections.remove(&connection);
        if member.connections.is_empty() {
            state.members.remove(key);
            tracing::info!("[Presence] {} left {}", key, topic);
            state.announce(topic, EventType::PresenceLeave, key);
        }
    }

    /// Refresh a member's heartbeat
    ///
    /// A member pruned while one of its connections is still open rejoins
    /// here. Returns false only when no open connection holds the key.
    pub fn heartbeat(&self, topic: &str, key: &str) -> bool {
        let mut topics = self.topics();
        let Some(state) = topics.get_mut(topic) else {
            return false;
        };
        if let Some(member) = state.members.get_mut(key) {
            member.last_seen = Instant::now();
            return true;
        }
        let Some(mut member) = state.dormant.remove(key) else {
            return false;
        };
        member.last_seen = Instant::now();
        state.members.insert(key.to_string(), member);
        tracing::info!("[Presence] {} rejoined {} on heartbeat", key, topic);
        state.announce(topic, EventType::PresenceJoin, key);
        true
    }

    /// Current membership of a presence topic
    pub fn presence_state(&self, topic: &str) -> PresenceState {
        self.topics()
            .get(topic)
            .map(TopicState::snapshot)
            .unwrap_or_default()
    }

    /// Remove members whose last heartbeat is older than `max_age`
    pub fn prune_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut pruned = 0;
        let mut topics = self.topics();

        for (topic, state) in topics.iter_mut() {
            let stale: Vec<String> = state
                .members
                .iter()
                .filter(|(_, member)| now.duration_since(member.last_seen) > max_age)
                .map(|(key, _)| key.clone())
                .collect();

            for key in stale {
                if let Some(member) = state.members.remove(&key) {
                    state.dormant.insert(key.clone(), member);
                }
                tracing::info!("[Presence] Pruned stale session {} from {}", key, topic);
                state.announce(topic, EventType::PresenceLeave, &key);
                pruned += 1;
            }
        }

        pruned
    }

    /// Drop topics with neither receivers nor members
    pub fn cleanup_inactive_topics(&self) {
        self.topics()
            .retain(|_, state| {
                state.sender.receiver_count() > 0 || !state.members.is_empty() || !state.dormant.is_empty()
            });
    }

    /// Receivers currently subscribed to a topic
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map(|state| state.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of live topics
    pub fn topic_count(&self) -> usize {
        self.topics().len()
    }
}

impl Outbound for Hub {
    fn deliver(&self, event: RealtimeEvent) -> Result<(), ChannelError> {
        if event.event_type.is_presence() {
            return Err(ChannelError::Forbidden(event.topic));
        }
        self.publish(event);
        Ok(())
    }
}

/// Presence membership held by one connection
///
/// Dropping the guard (or calling `release`) removes the connection; the key
/// leaves the topic once its last connection is gone.
pub struct PresenceGuard {
    hub: Hub,
    topic: String,
    key: String,
    connection: u64,
    released: bool,
}

impl PresenceGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Refresh this membership's heartbeat
    pub fn heartbeat(&self) -> bool {
        self.hub.heartbeat(&self.topic, &self.key)
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.hub.untrack(&self.topic, &self.key, self.connection);
        }
    }
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}
