//! View counter integration tests

use std::time::Duration;

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use bazaar_sync::backend::server::ServerConfig;
use bazaar_sync::backend::views::db as views_db;

use crate::common::TestApp;

#[tokio::test]
async fn test_repeat_views_count_once_per_cooldown() {
    let app = TestApp::new().await;
    let listing = views_db::create_listing(&app.state.db_pool, "Bike").await.unwrap();
    let token = app.token_for(Uuid::new_v4());
    let uri = format!("/listings/{}/view", listing);

    let (status, first) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["counted"], true);
    assert_eq!(first["views"], 1);

    let (_, second) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(second["counted"], false);
    assert_eq!(second["views"], 1);

    let (_, total) = app
        .request(Method::GET, &format!("/listings/{}/views", listing), None, None)
        .await;
    assert_eq!(total["views"], 1);
}

#[tokio::test]
async fn test_anonymous_views_need_session_key() {
    let app = TestApp::new().await;
    let listing = views_db::create_listing(&app.state.db_pool, "Lamp").await.unwrap();
    let uri = format!("/listings/{}/view", listing);

    let (_, keyless) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(keyless["counted"], false);

    let headers = [("x-session-key", "tab-1")];
    let (_, keyed) = app
        .request_with_headers(Method::POST, &uri, None, &headers, None)
        .await;
    assert_eq!(keyed["counted"], true);

    let (_, repeat) = app
        .request_with_headers(Method::POST, &uri, None, &headers, None)
        .await;
    assert_eq!(repeat["counted"], false);

    let other = [("x-session-key", "tab-2")];
    let (_, second_viewer) = app
        .request_with_headers(Method::POST, &uri, None, &other, None)
        .await;
    assert_eq!(second_viewer["views"], 2);
}

#[tokio::test]
async fn test_racing_duplicates_count_once() {
    let app = TestApp::new().await;
    let listing = views_db::create_listing(&app.state.db_pool, "Sofa").await.unwrap();
    let token = app.token_for(Uuid::new_v4());
    let uri = format!("/listings/{}/view", listing);

    let requests = (0..10).map(|_| app.request(Method::POST, &uri, Some(&token), None));
    let responses = futures_util::future::join_all(requests).await;

    let counted = responses.iter().filter(|(_, body)| body["counted"] == true).count();
    assert_eq!(counted, 1);
    assert_eq!(views_db::view_count(&app.state.db_pool, listing).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_view_counts_again_after_cooldown() {
    let config = ServerConfig {
        view_cooldown: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let app = TestApp::with_config(config).await;
    let listing = views_db::create_listing(&app.state.db_pool, "Desk").await.unwrap();
    let token = app.token_for(Uuid::new_v4());
    let uri = format!("/listings/{}/view", listing);

    app.request(Method::POST, &uri, Some(&token), None).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    let (_, later) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(later["counted"], true);
    assert_eq!(later["views"], 2);
}

#[tokio::test]
async fn test_unknown_listing() {
    let app = TestApp::new().await;
    let (status, _) = app.request(Method::GET, "/listings/999/views", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
