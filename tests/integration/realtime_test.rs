//! Realtime endpoint integration tests

use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use bazaar_sync::backend::realtime::LiveStatus;
use bazaar_sync::shared::{EventType, PresencePayload, RealtimeEvent, Topic};

use crate::common::{eventually, TestApp};

/// Read SSE frames until one carries data, and decode it
async fn next_event<S, E>(stream: &mut S, buffer: &mut String) -> RealtimeEvent
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Debug,
{
    loop {
        if let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if !data.is_empty() {
                return serde_json::from_str(&data.join("\n")).expect("event json");
            }
            continue;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("chunk");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_publish_rejects_presence_events() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());
    let (status, _) = app
        .request(
            Method::POST,
            "/realtime/lobby",
            Some(&token),
            Some(json!({"event": "presence_sync", "payload": {}})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_publish_requires_viewer_and_reaches_subscribers() {
    let app = TestApp::new().await;
    let body = json!({"event": "ping", "payload": {"n": 1}});

    let (status, _) = app
        .request(Method::POST, "/realtime/lobby", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut rx = app.state.hub.subscribe("lobby");
    let token = app.token_for(Uuid::new_v4());
    let (status, response) = app
        .request(Method::POST, "/realtime/lobby", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["receivers"], 1);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::Custom("ping".into()));
    assert_eq!(event.payload["n"], 1);
}

#[tokio::test]
async fn test_room_topic_requires_membership() {
    let app = TestApp::new().await;
    let member = Uuid::new_v4();
    let room = app.room_with(&[(member, "ann")]).await;
    let uri = format!("/realtime/{}", Topic::room(room));

    let response = app.open_stream(&uri, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let outsider = app.token_for(Uuid::new_v4());
    let response = app.open_stream(&uri, Some(&outsider)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.open_stream(&uri, Some(&app.token_for(member))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_presence_topic_follows_live_status() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let uri = format!("/realtime/{}", Topic::presence("stream", "s-1"));

    let response = app.open_stream(&uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.live.set("stream", "s-1", LiveStatus { is_live: false, owner_id: owner });
    let response = app.open_stream(&uri, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.open_stream(&uri, Some(&app.token_for(owner))).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.live.set("stream", "s-1", LiveStatus { is_live: true, owner_id: owner });
    let response = app.open_stream(&uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_presence_stream_tracks_until_disconnect() {
    let app = TestApp::new().await;
    let topic = Topic::presence("stream", "s-2");
    app.live.set("stream", "s-2", LiveStatus { is_live: true, owner_id: Uuid::new_v4() });

    let uri = format!("/realtime/{}?presence_key=tab-1&meta=%7B%22name%22%3A%22ann%22%7D", topic);
    let response = app.open_stream(&uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let mut buffer = String::new();
    let joined = next_event(&mut stream, &mut buffer).await;
    assert_eq!(joined.event_type, EventType::PresenceJoin);
    let payload: PresencePayload = joined.decode().unwrap();
    assert_eq!(payload.key.as_deref(), Some("tab-1"));
    assert_eq!(payload.state["tab-1"]["name"], "ann");

    let uri = format!("/realtime/{}/heartbeat?presence_key=tab-1", topic);
    let (_, heartbeat) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(heartbeat["tracked"], true);

    drop(stream);
    let hub = app.state.hub.clone();
    assert!(eventually(|| hub.presence_state(&topic).is_empty()).await);

    let (_, heartbeat) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(heartbeat["tracked"], false);
}

#[tokio::test]
async fn test_heartbeat_follows_subscribe_rules() {
    let app = TestApp::new().await;
    let member = Uuid::new_v4();
    let room = app.room_with(&[(member, "ann")]).await;
    let uri = format!("/realtime/{}/heartbeat?presence_key=tab-1", Topic::room(room));

    let (status, _) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let outsider = app.token_for(Uuid::new_v4());
    let (status, _) = app.request(Method::POST, &uri, Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::POST, &uri, Some(&app.token_for(member)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked"], false);

    let offline = format!("/realtime/{}/heartbeat?presence_key=tab-1", Topic::presence("stream", "gone"));
    let (status, _) = app.request(Method::POST, &offline, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_heartbeat_restores_pruned_open_stream() {
    let app = TestApp::new().await;
    let topic = Topic::presence("stream", "s-3");
    app.live.set("stream", "s-3", LiveStatus { is_live: true, owner_id: Uuid::new_v4() });

    let response = app
        .open_stream(&format!("/realtime/{}?presence_key=tab-1", topic), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let hub = app.state.hub.clone();
    assert_eq!(hub.presence_state(&topic).len(), 1);

    assert_eq!(hub.prune_stale(Duration::ZERO), 1);
    assert!(hub.presence_state(&topic).is_empty());

    let uri = format!("/realtime/{}/heartbeat?presence_key=tab-1", topic);
    let (_, heartbeat) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(heartbeat["tracked"], true);
    assert_eq!(hub.presence_state(&topic).len(), 1);

    drop(response);
    assert!(eventually(|| hub.presence_state(&topic).is_empty()).await);
}

#[tokio::test]
async fn test_bad_presence_meta_is_rejected() {
    let app = TestApp::new().await;
    let uri = "/realtime/lobby?presence_key=tab-1&meta=%7Bnope";
    let response = app.open_stream(uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
