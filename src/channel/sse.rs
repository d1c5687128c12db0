/**
 * Server-Sent Events Channel
 *
 * Client transport for sessions running outside the server process.
 *
 * - Subscribe: `GET /realtime/{topic}` streams `text/event-stream`; in
 *   presence mode the session key and metadata travel as query parameters.
 * - Send: `POST /realtime/{topic}` with `{"event", "payload"}`; requests are
 *   issued from a background task so `send` never waits on the network.
 * - Heartbeat: in presence mode `POST /realtime/{topic}/heartbeat` runs on an
 *   interval so the server keeps the membership alive. A `tracked: false`
 *   reply means the server no longer knows this session, so the stream is
 *   reopened and the membership re-established.
 *
 * A dropped stream is reopened after a short delay. Closing the handle aborts
 * all three tasks, which drops the HTTP stream and with it the server-side
 * membership.
 */
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};

use crate::channel::{Channel, ChannelError, ChannelHandle, Listeners, Outbound};
use crate::shared::{PresenceJoin, RealtimeEvent};

/// Default interval between presence heartbeats
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(15);

/// Pause between attempts to reopen a dropped subscription
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// [`Channel`] implementation over the server's `/realtime` endpoints
#[derive(Clone)]
pub struct SseChannel {
    client: Client,
    base_url: String,
    token: Option<String>,
    heartbeat: Duration,
}

/// Body of `POST /realtime/{topic}`
#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    event: &'a str,
    payload: &'a serde_json::Value,
}

/// Reply to `POST /realtime/{topic}/heartbeat`
#[derive(Debug, Deserialize)]
struct HeartbeatAck {
    tracked: bool,
}

struct QueueOutbound(mpsc::UnboundedSender<RealtimeEvent>);

impl Outbound for QueueOutbound {
    fn deliver(&self, event: RealtimeEvent) -> Result<(), ChannelError> {
        let topic = event.topic.clone();
        self.0.send(event).map_err(|_| ChannelError::Closed(topic))
    }
}

impl SseChannel {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/realtime/{}", self.base_url, topic)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Incremental `text/event-stream` parser
///
/// Buffers raw bytes so a multi-byte character split across chunks is only
/// decoded once its frame is complete.
#[derive(Default)]
pub(crate) struct SseParser {
    buffer: BytesMut,
}

impl SseParser {
    /// Feed a chunk and return the `data` of every completed event
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame = self.buffer.split_to(end + 2);
            let frame = String::from_utf8_lossy(&frame);
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|data| data.strip_prefix(' ').unwrap_or(data))
                .collect();
            if !data.is_empty() {
                frames.push(data.join("\n"));
            }
        }
        frames
    }
}

impl SseChannel {
    /// Issue the subscribe request and check its status
    async fn connect(
        &self,
        topic: &str,
        presence: Option<&PresenceJoin>,
    ) -> Result<reqwest::Response, ChannelError> {
        let mut request = self.authorize(self.client.get(self.topic_url(topic)));
        if let Some(join) = presence {
            let meta = serde_json::to_string(&join.meta)
                .map_err(|e| ChannelError::Transport(e.to_string()))?;
            request = request.query(&[("presence_key", join.key.as_str()), ("meta", meta.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ChannelError::Unauthenticated(topic.to_string())),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(ChannelError::Forbidden(topic.to_string()))
            }
            status => Err(ChannelError::Transport(format!(
                "subscribe to {} failed: {}",
                topic, status
            ))),
        }
    }
}

/// Dispatch every event on `response` until it ends or `rejoin` fires
///
/// Returns true when stopped by `rejoin`.
async fn pump(response: reqwest::Response, topic: &str, listeners: &Listeners, rejoin: &Notify) -> bool {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();
    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(chunk)) => {
                    for data in parser.push(&chunk) {
                        match serde_json::from_str::<RealtimeEvent>(&data) {
                            Ok(event) => listeners.dispatch(&event),
                            Err(e) => tracing::warn!("[Channel] Dropping malformed event: {}", e),
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("[Channel] Stream for {} failed: {}", topic, e);
                    return false;
                }
                None => {
                    tracing::debug!("[Channel] Stream for {} ended", topic);
                    return false;
                }
            },
            _ = rejoin.notified() => {
                tracing::info!("[Presence] Server lost our membership on {}, resubscribing", topic);
                return true;
            }
        }
    }
}

impl Channel for SseChannel {
    async fn open(
        &self,
        topic: &str,
        presence: Option<PresenceJoin>,
        listeners: Listeners,
    ) -> Result<ChannelHandle, ChannelError> {
        let response = self.connect(topic, presence.as_ref()).await?;

        let (tx, mut outbox) = mpsc::unbounded_channel::<RealtimeEvent>();
        let handle = ChannelHandle::new(topic, listeners.clone(), Arc::new(QueueOutbound(tx)));
        let rejoin = Arc::new(Notify::new());

        // Inbound: dispatch the event stream, reconnecting when it drops.
        let client = self.clone();
        let pump_topic = topic.to_string();
        let pump_presence = presence.clone();
        let pump_rejoin = rejoin.clone();
        handle.attach_task(tokio::spawn(async move {
            let mut response = Some(response);
            loop {
                let current = match response.take() {
                    Some(current) => current,
                    None => match client.connect(&pump_topic, pump_presence.as_ref()).await {
                        Ok(current) => current,
                        Err(ChannelError::Transport(e)) => {
                            tracing::debug!("[Channel] Reconnect to {} failed: {}", pump_topic, e);
                            tokio::time::sleep(RECONNECT_DELAY).await;
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!("[Channel] Giving up on {}: {}", pump_topic, e);
                            return;
                        }
                    },
                };
                if !pump(current, &pump_topic, &listeners, &pump_rejoin).await {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }));

        // Outbound: POST each queued event; failures are logged, never retried.
        let client = self.clone();
        let url = self.topic_url(topic);
        handle.attach_task(tokio::spawn(async move {
            while let Some(event) = outbox.recv().await {
                let body = PublishRequest {
                    event: event.event_type.as_str(),
                    payload: &event.payload,
                };
                let result = client
                    .authorize(client.client.post(&url))
                    .json(&body)
                    .send()
                    .await;
                match result {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        tracing::warn!("[Channel] Publish to {} rejected: {}", url, response.status())
                    }
                    Err(e) => tracing::warn!("[Channel] Publish to {} failed: {}", url, e),
                }
            }
        }));

        if let Some(join) = presence {
            let client = self.clone();
            let url = format!("{}/heartbeat", self.topic_url(topic));
            handle.attach_task(tokio::spawn(async move {
                let mut interval = tokio::time::interval(client.heartbeat);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let result = client
                        .authorize(client.client.post(&url))
                        .query(&[("presence_key", join.key.as_str())])
                        .send()
                        .await;
                    let response = match result {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::debug!("[Presence] Heartbeat to {} failed: {}", url, e);
                            continue;
                        }
                    };
                    match response.json::<HeartbeatAck>().await {
                        Ok(ack) if !ack.tracked => rejoin.notify_one(),
                        Ok(_) => {}
                        Err(e) => tracing::debug!("[Presence] Bad heartbeat reply from {}: {}", url, e),
                    }
                }
            }));
        }

        Ok(handle)
    }
}
