//! Publish and heartbeat endpoints
//!
//! - `POST /realtime/{topic}` - broadcast `{event, payload}` to the topic
//! - `POST /realtime/{topic}/heartbeat?presence_key=` - keep a presence member alive
//!
//! Presence events are produced by the hub alone; peers may not publish them.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::access::{authorize, Access};
use super::live::LiveDirectory;
use crate::backend::auth::Viewer;
use crate::backend::error::BackendError;
use crate::channel::Hub;
use crate::shared::{EventType, RealtimeEvent};

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishResponse {
    /// Subscribers the event was handed to
    pub receivers: usize,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatQuery {
    pub presence_key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartbeatResponse {
    /// False once no open connection holds the key; the client should resubscribe
    pub tracked: bool,
}

/// Broadcast an event (POST /realtime/{topic})
pub async fn publish(
    State(hub): State<Hub>,
    State(pool): State<SqlitePool>,
    State(live): State<Arc<dyn LiveDirectory>>,
    viewer: Viewer,
    Path(topic): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, BackendError> {
    let event_type = EventType::from(request.event);
    if event_type.is_presence() {
        return Err(BackendError::forbidden("Presence events cannot be published"));
    }
    authorize(&pool, live.as_ref(), viewer, &topic, Access::Publish).await?;

    let receivers = hub.publish(RealtimeEvent::new(topic.as_str(), event_type, request.payload));
    Ok(Json(PublishResponse { receivers }))
}

/// Refresh a presence member (POST /realtime/{topic}/heartbeat)
///
/// Held to the same rules as subscribing: only a viewer who may open the
/// topic can keep a membership on it alive.
pub async fn heartbeat(
    State(hub): State<Hub>,
    State(pool): State<SqlitePool>,
    State(live): State<Arc<dyn LiveDirectory>>,
    viewer: Viewer,
    Path(topic): Path<String>,
    Query(query): Query<HeartbeatQuery>,
) -> Result<Json<HeartbeatResponse>, BackendError> {
    authorize(&pool, live.as_ref(), viewer, &topic, Access::Subscribe).await?;

    let tracked = hub.heartbeat(&topic, &query.presence_key);
    if !tracked {
        tracing::debug!("[Presence] Heartbeat for unknown {} on {}", query.presence_key, topic);
    }
    Ok(Json(HeartbeatResponse { tracked }))
}
