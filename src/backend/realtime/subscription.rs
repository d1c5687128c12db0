/**
 * Real-time Subscription Handler
 *
 * `GET /realtime/{topic}` streams every event published on one topic as
 * Server-Sent Events. Each SSE event is named after the event type and its
 * data is the JSON-encoded `RealtimeEvent`.
 *
 * # Presence mode
 *
 * With `?presence_key=<key>&meta=<json>` the connection also joins the
 * topic's presence membership. The membership guard lives inside the stream
 * state, so it is released when the client disconnects and axum drops the
 * stream. Clients refresh it with `POST /realtime/{topic}/heartbeat`.
 *
 * # Connection Management
 *
 * - Keep-alive comments are injected by axum
 * - Lagged receivers skip ahead; missed events are recovered by refetching
 */
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream;
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::Stream;

use super::access::{authorize, Access};
use super::live::LiveDirectory;
use crate::backend::auth::Viewer;
use crate::backend::error::BackendError;
use crate::channel::Hub;
use crate::shared::{PresenceJoin, SharedError};

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    pub presence_key: Option<String>,
    /// JSON-encoded presence metadata
    pub meta: Option<String>,
}

impl SubscribeQuery {
    fn presence(&self) -> Result<Option<PresenceJoin>, SharedError> {
        let Some(key) = self.presence_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let meta = match self.meta.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
                .map_err(|e| SharedError::validation("meta", e.to_string()))?,
            _ => serde_json::Value::Null,
        };
        Ok(Some(PresenceJoin::new(key).with_meta(meta)))
    }
}

/// Subscribe to a topic (GET /realtime/{topic})
pub async fn subscribe(
    State(hub): State<Hub>,
    State(pool): State<SqlitePool>,
    State(live): State<Arc<dyn LiveDirectory>>,
    viewer: Viewer,
    Path(topic): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BackendError> {
    let presence = query.presence()?;
    authorize(&pool, live.as_ref(), viewer, &topic, Access::Subscribe).await?;

    // Subscribe before tracking so the joiner sees its own snapshot.
    let rx = hub.subscribe(&topic);
    let guard = presence.map(|join| hub.track(&topic, join));
    tracing::info!(
        "[Realtime] Subscribed to {} (presence={})",
        topic,
        guard.as_ref().map(|g| g.key()).unwrap_or("-")
    );

    let stream = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!("[Realtime] Failed to serialize event: {:?}", e);
                            continue;
                        }
                    };
                    let sse_event = Event::default().event(event.event_type.as_str()).data(data);
                    return Some((Ok(sse_event), (rx, guard)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Realtime] Receiver lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("[Realtime] Topic closed, ending stream");
                    return None;
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
