//! SSE client against a server on a local port

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bazaar_sync::backend::realtime::LiveStatus;
use bazaar_sync::channel::{Channel, Listeners, SseChannel};
use bazaar_sync::shared::{PresenceJoin, Topic};

use crate::common::{eventually, serve, TestApp};

#[tokio::test]
async fn test_presence_over_sse_survives_pruning() {
    let app = TestApp::new().await;
    let topic = Topic::presence("stream", "s-9");
    app.live.set("stream", "s-9", LiveStatus { is_live: true, owner_id: Uuid::new_v4() });
    let base = app.serve().await;

    let channel = SseChannel::new(base, None).with_heartbeat(Duration::from_millis(20));
    let handle = channel
        .open(&topic, Some(PresenceJoin::new("tab-1")), Listeners::new())
        .await
        .unwrap();

    let hub = app.state.hub.clone();
    assert!(eventually(|| hub.presence_state(&topic).len() == 1).await);

    assert_eq!(hub.prune_stale(Duration::ZERO), 1);
    assert!(eventually(|| hub.presence_state(&topic).len() == 1).await);

    handle.close();
    assert!(eventually(|| hub.presence_state(&topic).is_empty()).await);
}

#[tokio::test]
async fn test_untracked_heartbeat_reopens_stream() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();
    let router = Router::new()
        .route(
            "/realtime/{topic}",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Sse::new(futures_util::stream::pending::<Result<Event, Infallible>>())
                }
            }),
        )
        .route(
            "/realtime/{topic}/heartbeat",
            post(|| async { Json(json!({"tracked": false})) }),
        );
    let base = serve(router).await;

    let channel = SseChannel::new(base, None).with_heartbeat(Duration::from_millis(20));
    let _handle = channel
        .open("presence:stream:x", Some(PresenceJoin::new("tab-1")), Listeners::new())
        .await
        .unwrap();

    assert!(eventually(|| opened.load(Ordering::SeqCst) >= 2).await);
}
