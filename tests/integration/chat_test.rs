//! Chat API integration tests

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use crate::common::TestApp;

#[tokio::test]
async fn test_send_and_list_messages() {
    let app = TestApp::new().await;
    let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let room = app.room_with(&[(ann, "ann"), (bob, "bob")]).await;
    let token = app.token_for(ann);
    let uri = format!("/chat-room/{}/messages", room);

    let (status, sent) = app
        .request(Method::POST, &uri, Some(&token), Some(json!({"payload": "hi bob"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["payload"], "hi bob");
    assert_eq!(sent["is_read"], false);
    assert_eq!(sent["sender"]["username"], "ann");

    app.request(Method::POST, &uri, Some(&token), Some(json!({"payload": "second"})))
        .await;

    let (status, listed) = app.request(Method::GET, &uri, Some(&app.token_for(bob)), None).await;
    assert_eq!(status, StatusCode::OK);
    let payloads: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["payload"].as_str().unwrap())
        .collect();
    assert_eq!(payloads, vec!["hi bob", "second"]);
}

#[tokio::test]
async fn test_invalid_payload_is_rejected_before_persisting() {
    let app = TestApp::new().await;
    let ann = Uuid::new_v4();
    let room = app.room_with(&[(ann, "ann")]).await;
    let token = app.token_for(ann);
    let uri = format!("/chat-room/{}/messages", room);

    let (status, _) = app
        .request(Method::POST, &uri, Some(&token), Some(json!({"payload": "   "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_long = "x".repeat(2001);
    let (status, _) = app
        .request(Method::POST, &uri, Some(&token), Some(json!({"payload": too_long})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_room_access() {
    let app = TestApp::new().await;
    let ann = Uuid::new_v4();
    let room = app.room_with(&[(ann, "ann")]).await;
    let uri = format!("/chat-room/{}/messages", room);

    let (status, _) = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let outsider = app.token_for(Uuid::new_v4());
    let (status, _) = app.request(Method::GET, &uri, Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, &format!("/chat-room/{}/messages", room + 100), Some(&app.token_for(ann)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mark_read_only_flips_messages_from_others() {
    let app = TestApp::new().await;
    let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let room = app.room_with(&[(ann, "ann"), (bob, "bob")]).await;
    let (ann_token, bob_token) = (app.token_for(ann), app.token_for(bob));
    let messages = format!("/chat-room/{}/messages", room);
    let mark_read = format!("/chat-room/{}/mark-read", room);

    let (_, from_ann) = app
        .request(Method::POST, &messages, Some(&ann_token), Some(json!({"payload": "one"})))
        .await;
    app.request(Method::POST, &messages, Some(&bob_token), Some(json!({"payload": "two"})))
        .await;

    let (status, receipt) = app.request(Method::POST, &mark_read, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["read_ids"], json!([from_ann["id"]]));

    let (_, again) = app.request(Method::POST, &mark_read, Some(&bob_token), None).await;
    assert_eq!(again["read_ids"], json!([]));

    let (_, listed) = app.request(Method::GET, &messages, Some(&ann_token), None).await;
    let flags: Vec<bool> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["is_read"].as_bool().unwrap())
        .collect();
    assert_eq!(flags, vec![true, false]);
}
