//! In-process test server
//!
//! Builds the real router over an in-memory SQLite database and drives it
//! with `tower::ServiceExt::oneshot`. [`InProcessApi`] implements the client
//! API traits on top of it, so client flows can run end-to-end against the
//! real handlers and the server's hub. [`TestApp::serve`] exposes the same
//! router over TCP for the SSE client.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use bazaar_sync::backend::chat::db as chat_db;
use bazaar_sync::backend::realtime::{LiveDirectory, StaticLiveDirectory};
use bazaar_sync::backend::routes::create_router;
use bazaar_sync::backend::server::{create_state, AppState, ServerConfig};
use bazaar_sync::channel::LocalChannel;
use bazaar_sync::client::{ChatApi, FollowApi, MutationError};
use bazaar_sync::shared::{FollowStatus, FollowToggleResponse, Message, ReadReceipt, SendMessageRequest};

#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub live: Arc<StaticLiveDirectory>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let live = Arc::new(StaticLiveDirectory::new());
        let directory: Arc<dyn LiveDirectory> = live.clone();
        let state = create_state(config, directory).await.expect("test state");
        let router = create_router(state.clone());
        Self { state, live, router }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state.jwt.create_token(user_id, 3600).expect("token")
    }

    /// Channel sharing the server's hub
    pub fn channel(&self) -> LocalChannel {
        LocalChannel::new(self.state.hub.clone())
    }

    /// Create a room with the given members
    pub async fn room_with(&self, members: &[(Uuid, &str)]) -> i64 {
        let room_id = chat_db::create_room(&self.state.db_pool, "test room")
            .await
            .expect("room");
        for (user_id, username) in members {
            chat_db::add_member(&self.state.db_pool, room_id, *user_id, username, None)
                .await
                .expect("member");
        }
        room_id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request_with_headers(method, uri, token, &[], body).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Issue a GET and return the response without reading the body
    pub async fn open_stream(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder.body(Body::empty()).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Serve the router on an ephemeral local port and return its base URL
    pub async fn serve(&self) -> String {
        serve(self.router.clone()).await
    }

    /// Client API for `viewer` backed by this app
    pub fn api(&self, viewer: Option<Uuid>) -> InProcessApi {
        InProcessApi {
            token: viewer.map(|id| self.token_for(id)),
            app: Arc::new(self.clone()),
        }
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{}", addr)
}

/// Client API traits over the in-process router
pub struct InProcessApi {
    app: Arc<TestApp>,
    token: Option<String>,
}

impl InProcessApi {
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<T, MutationError> {
        let (status, value) = self.app.request(method, uri, self.token.as_deref(), body).await;
        let message = value["error"].as_str().unwrap_or_default().to_string();
        match status {
            s if s.is_success() => {
                serde_json::from_value(value).map_err(|e| MutationError::Transient(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(MutationError::Unauthenticated),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(MutationError::Forbidden(message)),
            s if s.is_client_error() => Err(MutationError::Validation(message)),
            _ => Err(MutationError::Transient(message)),
        }
    }
}

impl FollowApi for InProcessApi {
    async fn follow(&self, target_id: Uuid) -> Result<FollowToggleResponse, MutationError> {
        self.call(Method::POST, &format!("/follow/{}", target_id), None).await
    }

    async fn unfollow(&self, target_id: Uuid) -> Result<FollowToggleResponse, MutationError> {
        self.call(Method::DELETE, &format!("/follow/{}", target_id), None).await
    }

    async fn follow_status(&self, target_id: Uuid) -> Result<FollowStatus, MutationError> {
        self.call(Method::GET, &format!("/follow/{}", target_id), None).await
    }
}

impl ChatApi for InProcessApi {
    async fn send_message(&self, room_id: i64, payload: &str) -> Result<Message, MutationError> {
        let body = serde_json::to_value(SendMessageRequest {
            payload: payload.to_string(),
        })
        .map_err(|e| MutationError::Validation(e.to_string()))?;
        self.call(Method::POST, &format!("/chat-room/{}/messages", room_id), Some(body))
            .await
    }

    async fn mark_read(&self, room_id: i64) -> Result<ReadReceipt, MutationError> {
        self.call(Method::POST, &format!("/chat-room/{}/mark-read", room_id), None)
            .await
    }

    async fn fetch_messages(&self, room_id: i64) -> Result<Vec<Message>, MutationError> {
        self.call(Method::GET, &format!("/chat-room/{}/messages", room_id), None)
            .await
    }
}
