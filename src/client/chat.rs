//! Chat room client
//!
//! [`ChatRoomView`] is the materialized message list for one room.
//! [`ChatRoom`] wires it to the `room-<id>` topic and the chat endpoints.
//!
//! # Flows
//!
//! - **Send**: validate, show a provisional entry, persist, then replace the
//!   provisional entry and broadcast `message`. A failed persist leaves the
//!   entry visible as `Failed` for retry or discard.
//! - **Receive**: `message` events are deduplicated by id and inserted in
//!   `created_at` order. Messages from others trigger the read-mark flow.
//! - **Read**: one `mark-read` request per room at a time; a non-empty
//!   receipt is broadcast as `message_read`. Read flags only go from false to
//!   true.
//!
//! The channel is a shortcut, not the record: [`ChatRoom::resync`] merges a
//! full history fetch with the same dedup and read rules, and is run on open.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::channel::{Channel, ChannelHandle, Listeners};
use crate::client::api::{ChatApi, ClientError, MutationError};
use crate::shared::message::validate_payload;
use crate::shared::{EventType, Message, ReadReceipt, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sending,
    Failed,
}

/// A message shown before the server has accepted it
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionalMessage {
    /// Negative, unique within the view
    pub local_id: i64,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

/// Everything the UI renders for a room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    /// Persisted messages, oldest first
    pub messages: Vec<Message>,
    /// Local entries not yet persisted, in send order
    pub provisional: Vec<ProvisionalMessage>,
}

#[derive(Default)]
struct ViewState {
    snapshot: ChatSnapshot,
    seen: HashSet<i64>,
    /// Ids named by a receipt before their message arrived
    read_ahead: HashSet<i64>,
    next_local_id: i64,
}

/// Materialized message list for one room
pub struct ChatRoomView {
    room_id: i64,
    state: Mutex<ViewState>,
    tx: watch::Sender<ChatSnapshot>,
}

impl ChatRoomView {
    pub fn new(room_id: i64) -> Self {
        Self {
            room_id,
            state: Mutex::new(ViewState::default()),
            tx: watch::channel(ChatSnapshot::default()).0,
        }
    }

    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.tx.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tx.borrow().messages.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.tx.send_replace(state.snapshot.clone());
        result
    }

    fn insert_locked(state: &mut ViewState, mut message: Message) -> bool {
        if state.read_ahead.remove(&message.id) {
            message.mark_read();
        }
        if !state.seen.insert(message.id) {
            // Known already; only the read flag may move, and only forward.
            if message.is_read {
                if let Some(existing) = state.snapshot.messages.iter_mut().find(|m| m.id == message.id) {
                    existing.mark_read();
                }
            }
            return false;
        }
        let key = message.sort_key();
        let at = state
            .snapshot
            .messages
            .partition_point(|existing| existing.sort_key() <= key);
        state.snapshot.messages.insert(at, message);
        true
    }

    /// Insert a persisted message. Returns false for duplicates.
    pub fn insert(&self, message: Message) -> bool {
        if message.room_id != self.room_id {
            return false;
        }
        self.update(|state| Self::insert_locked(state, message))
    }

    /// Merge a full history fetch
    pub fn merge(&self, messages: Vec<Message>) -> usize {
        let room_id = self.room_id;
        self.update(|state| {
            messages
                .into_iter()
                .filter(|m| m.room_id == room_id)
                .map(|m| Self::insert_locked(state, m))
                .filter(|inserted| *inserted)
                .count()
        })
    }

    /// Flip `is_read` for the listed ids. Returns how many changed.
    ///
    /// Ids not received yet are remembered and applied when their message
    /// arrives.
    pub fn apply_read(&self, read_ids: &[i64]) -> usize {
        let ids: HashSet<i64> = read_ids.iter().copied().collect();
        self.update(|state| {
            let unseen: Vec<i64> = ids.iter().copied().filter(|id| !state.seen.contains(id)).collect();
            state.read_ahead.extend(unseen);
            let mut flipped = 0;
            for message in state.snapshot.messages.iter_mut() {
                if !message.is_read && ids.contains(&message.id) {
                    message.mark_read();
                    flipped += 1;
                }
            }
            flipped
        })
    }

    /// Whether any message from someone other than `reader` is unread
    pub fn has_unread_from_others(&self, reader: Uuid) -> bool {
        self.tx
            .borrow()
            .messages
            .iter()
            .any(|m| !m.is_read && m.sender_id() != reader)
    }

    fn push_provisional(&self, payload: &str) -> i64 {
        self.update(|state| {
            state.next_local_id -= 1;
            let local_id = state.next_local_id;
            state.snapshot.provisional.push(ProvisionalMessage {
                local_id,
                payload: payload.to_string(),
                created_at: Utc::now(),
                status: DeliveryStatus::Sending,
            });
            local_id
        })
    }

    /// Swap a provisional entry for its persisted message
    fn confirm(&self, local_id: i64, message: Message) {
        self.update(|state| {
            state.snapshot.provisional.retain(|p| p.local_id != local_id);
            Self::insert_locked(state, message);
        });
    }

    fn set_status(&self, local_id: i64, status: DeliveryStatus) -> Option<String> {
        self.update(|state| {
            let entry = state
                .snapshot
                .provisional
                .iter_mut()
                .find(|p| p.local_id == local_id)?;
            entry.status = status;
            Some(entry.payload.clone())
        })
    }

    /// Remove a provisional entry. Returns false if it does not exist.
    pub fn discard(&self, local_id: i64) -> bool {
        self.update(|state| {
            let before = state.snapshot.provisional.len();
            state.snapshot.provisional.retain(|p| p.local_id != local_id);
            state.snapshot.provisional.len() != before
        })
    }
}

struct RoomInner<A> {
    room_id: i64,
    viewer_id: Uuid,
    api: Arc<A>,
    view: Arc<ChatRoomView>,
    handle: OnceLock<ChannelHandle>,
    read_in_flight: AtomicBool,
}

/// Clears the read-mark gate when the request finishes or is cancelled
struct ReadGate<'a>(&'a AtomicBool);

impl Drop for ReadGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: ChatApi + 'static> RoomInner<A> {
    fn broadcast(&self, event: EventType, payload: serde_json::Value) {
        let Some(handle) = self.handle.get() else {
            return;
        };
        if let Err(e) = handle.send(event, payload) {
            tracing::warn!("[Chat] Broadcast on room {} failed: {}", self.room_id, e);
        }
    }

    async fn mark_read(&self) -> Result<Option<ReadReceipt>, MutationError> {
        if self.read_in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("[Chat] Read-mark already in flight for room {}", self.room_id);
            return Ok(None);
        }
        let _gate = ReadGate(&self.read_in_flight);

        let receipt = self.api.mark_read(self.room_id).await?;
        if !receipt.read_ids.is_empty() {
            self.view.apply_read(&receipt.read_ids);
            match serde_json::to_value(&receipt) {
                Ok(payload) => self.broadcast(EventType::MessageRead, payload),
                Err(e) => tracing::warn!("[Chat] Failed to encode receipt: {}", e),
            }
        }
        Ok(Some(receipt))
    }

    fn spawn_mark_read(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(e) = self.mark_read().await {
                tracing::warn!("[Chat] Mark-read for room {} failed: {}", self.room_id, e);
            }
        });
    }

    fn on_message(self: Arc<Self>, message: Message) {
        let from_other = message.sender_id() != self.viewer_id;
        if self.view.insert(message) && from_other {
            self.spawn_mark_read();
        }
    }
}

/// A mounted chat room
pub struct ChatRoom<A> {
    inner: Arc<RoomInner<A>>,
}

impl<A: ChatApi + 'static> ChatRoom<A> {
    /// Subscribe to the room, then fetch its history and mark it read
    pub async fn open<C: Channel>(
        channel: &C,
        api: Arc<A>,
        room_id: i64,
        viewer_id: Uuid,
    ) -> Result<Self, ClientError> {
        let inner = Arc::new(RoomInner {
            room_id,
            viewer_id,
            api,
            view: Arc::new(ChatRoomView::new(room_id)),
            handle: OnceLock::new(),
            read_in_flight: AtomicBool::new(false),
        });

        // Listeners hold weak references; the handle lives inside `inner`.
        let on_message: Weak<RoomInner<A>> = Arc::downgrade(&inner);
        let on_read: Weak<RoomInner<A>> = Arc::downgrade(&inner);
        let listeners = Listeners::new()
            .on(EventType::Message, move |event| {
                let Some(inner) = on_message.upgrade() else { return };
                match event.decode::<Message>() {
                    Ok(message) => inner.on_message(message),
                    Err(e) => tracing::warn!("[Chat] Malformed message on {}: {}", event.topic, e),
                }
            })
            .on(EventType::MessageRead, move |event| {
                let Some(inner) = on_read.upgrade() else { return };
                match event.decode::<ReadReceipt>() {
                    Ok(receipt) => {
                        inner.view.apply_read(&receipt.read_ids);
                    }
                    Err(e) => tracing::warn!("[Chat] Malformed receipt on {}: {}", event.topic, e),
                }
            });

        let handle = channel.open(&Topic::room(room_id), None, listeners).await?;
        // Freshly created, so the cell is empty.
        let _ = inner.handle.set(handle);

        let room = Self { inner };
        room.resync().await?;
        Ok(room)
    }

    pub fn room_id(&self) -> i64 {
        self.inner.room_id
    }

    pub fn view(&self) -> &Arc<ChatRoomView> {
        &self.inner.view
    }

    /// Send a message
    ///
    /// Validation failures return before anything is shown. On persistence
    /// failure the provisional entry stays as `Failed`.
    pub async fn send(&self, payload: &str) -> Result<Message, MutationError> {
        validate_payload(payload)?;
        let local_id = self.inner.view.push_provisional(payload);
        self.deliver(local_id, payload).await
    }

    /// Resend a `Failed` provisional entry
    pub async fn retry(&self, local_id: i64) -> Result<Message, MutationError> {
        let payload = self
            .inner
            .view
            .set_status(local_id, DeliveryStatus::Sending)
            .ok_or_else(|| MutationError::Validation(format!("no pending message {}", local_id)))?;
        self.deliver(local_id, &payload).await
    }

    /// Drop a provisional entry the user gave up on
    pub fn discard(&self, local_id: i64) -> bool {
        self.inner.view.discard(local_id)
    }

    async fn deliver(&self, local_id: i64, payload: &str) -> Result<Message, MutationError> {
        match self.inner.api.send_message(self.inner.room_id, payload).await {
            Ok(message) => {
                self.inner.view.confirm(local_id, message.clone());
                match serde_json::to_value(&message) {
                    Ok(envelope) => self.inner.broadcast(EventType::Message, envelope),
                    Err(e) => tracing::warn!("[Chat] Failed to encode message: {}", e),
                }
                Ok(message)
            }
            Err(error) => {
                tracing::warn!("[Chat] Send to room {} failed: {}", self.inner.room_id, error);
                self.inner.view.set_status(local_id, DeliveryStatus::Failed);
                Err(error)
            }
        }
    }

    /// Mark the room read. `Ok(None)` when another request is in flight.
    pub async fn mark_read(&self) -> Result<Option<ReadReceipt>, MutationError> {
        self.inner.mark_read().await
    }

    /// Fetch the full history and merge it into the view
    pub async fn resync(&self) -> Result<usize, MutationError> {
        let messages = self.inner.api.fetch_messages(self.inner.room_id).await?;
        let added = self.inner.view.merge(messages);
        if self.inner.view.has_unread_from_others(self.inner.viewer_id) {
            self.inner.clone().spawn_mark_read();
        }
        Ok(added)
    }

    pub fn close(&self) {
        if let Some(handle) = self.inner.handle.get() {
            handle.close();
        }
    }
}
