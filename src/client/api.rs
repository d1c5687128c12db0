//! Server API client
//!
//! The flows in this module tree talk to the server through the [`FollowApi`]
//! and [`ChatApi`] traits so they can be driven by [`HttpApi`] in production
//! and by in-memory fakes in tests.

use std::future::Future;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::channel::ChannelError;
use crate::client::config::Config;
use crate::shared::{FollowStatus, FollowToggleResponse, Message, ReadReceipt, SendMessageRequest};

/// Why a mutation did not go through
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// No signed-in viewer; the caller should ask the user to log in
    #[error("sign in required")]
    Unauthenticated,
    /// The viewer may not act on this resource
    #[error("not allowed: {0}")]
    Forbidden(String),
    /// Rejected input; retrying unchanged will fail again
    #[error("invalid request: {0}")]
    Validation(String),
    /// Network failure, timeout or server error; safe to retry
    #[error("temporary failure: {0}")]
    Transient(String),
}

impl MutationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<crate::shared::SharedError> for MutationError {
    fn from(error: crate::shared::SharedError) -> Self {
        Self::Validation(error.to_string())
    }
}

/// Errors raised while mounting a client view
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Follow endpoints
pub trait FollowApi: Send + Sync {
    fn follow(&self, target_id: Uuid) -> impl Future<Output = Result<FollowToggleResponse, MutationError>> + Send;

    fn unfollow(&self, target_id: Uuid) -> impl Future<Output = Result<FollowToggleResponse, MutationError>> + Send;

    fn follow_status(&self, target_id: Uuid) -> impl Future<Output = Result<FollowStatus, MutationError>> + Send;
}

/// Chat endpoints
pub trait ChatApi: Send + Sync {
    fn send_message(&self, room_id: i64, payload: &str) -> impl Future<Output = Result<Message, MutationError>> + Send;

    fn mark_read(&self, room_id: i64) -> impl Future<Output = Result<ReadReceipt, MutationError>> + Send;

    fn fetch_messages(&self, room_id: i64) -> impl Future<Output = Result<Vec<Message>, MutationError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// reqwest-backed implementation of every API trait
#[derive(Debug, Clone)]
pub struct HttpApi {
    config: Config,
    client: Client,
}

impl HttpApi {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, MutationError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| MutationError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| MutationError::Transient(format!("Failed to parse response: {}", e)));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        tracing::debug!("[Api] Request failed: {} - {}", status, message);
        Err(error_for_status(status, message))
    }
}

fn error_for_status(status: StatusCode, message: String) -> MutationError {
    match status {
        StatusCode::UNAUTHORIZED => MutationError::Unauthenticated,
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => MutationError::Forbidden(message),
        status if status.is_client_error() => MutationError::Validation(message),
        _ => MutationError::Transient(message),
    }
}

impl FollowApi for HttpApi {
    async fn follow(&self, target_id: Uuid) -> Result<FollowToggleResponse, MutationError> {
        let url = self.config.api_url(&format!("/follow/{}", target_id));
        self.execute(self.client.post(url)).await
    }

    async fn unfollow(&self, target_id: Uuid) -> Result<FollowToggleResponse, MutationError> {
        let url = self.config.api_url(&format!("/follow/{}", target_id));
        self.execute(self.client.delete(url)).await
    }

    async fn follow_status(&self, target_id: Uuid) -> Result<FollowStatus, MutationError> {
        let url = self.config.api_url(&format!("/follow/{}", target_id));
        self.execute(self.client.get(url)).await
    }
}

impl ChatApi for HttpApi {
    async fn send_message(&self, room_id: i64, payload: &str) -> Result<Message, MutationError> {
        let url = self.config.api_url(&format!("/chat-room/{}/messages", room_id));
        let body = SendMessageRequest {
            payload: payload.to_string(),
        };
        self.execute(self.client.post(url).json(&body)).await
    }

    async fn mark_read(&self, room_id: i64) -> Result<ReadReceipt, MutationError> {
        let url = self.config.api_url(&format!("/chat-room/{}/mark-read", room_id));
        self.execute(self.client.post(url)).await
    }

    async fn fetch_messages(&self, room_id: i64) -> Result<Vec<Message>, MutationError> {
        let url = self.config.api_url(&format!("/chat-room/{}/messages", room_id));
        self.execute(self.client.get(url)).await
    }
}
