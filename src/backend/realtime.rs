//! Realtime Change Feed
//!
//! Row-change notifications over the backend's Phoenix-channel websocket.
//! One socket per subscription: join a `realtime:*` topic configured with a
//! `postgres_changes` filter, heartbeat every 30 seconds, forward decoded
//! change events, and leave when the subscription is dropped.

use super::{BackendError, BackendResult, Session};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

/// Interval between `phoenix` heartbeats
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for the join reply
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// Which changes a subscription wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    /// Row filter in `column=eq.value` form
    pub filter: Option<String>,
}

impl ChangeFilter {
    /// Inserts into `public.{table}`
    pub fn inserts(table: &str) -> Self {
        Self {
            kind: ChangeKind::Insert,
            schema: "public".to_string(),
            table: table.to_string(),
            filter: None,
        }
    }

    /// Restrict to rows where `column` equals `value`
    pub fn where_eq(mut self, column: &str, value: &str) -> Self {
        self.filter = Some(format!("{}=eq.{}", column, value));
        self
    }

    fn to_config(&self) -> Value {
        let mut change = json!({
            "event": self.kind.as_str(),
            "schema": self.schema,
            "table": self.table,
        });
        if let Some(filter) = &self.filter {
            change["filter"] = json!(filter);
        }
        change
    }
}

/// A decoded row change
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    /// The new row (empty object for deletes)
    pub record: Value,
}

impl ChangeEvent {
    /// String column of the changed row
    pub fn field(&self, column: &str) -> Option<&str> {
        self.record.get(column).and_then(|v| v.as_str())
    }
}

/// Live stream of change events
///
/// Dropping it tears the underlying subscription down.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Next event, or `None` once the feed has closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

/// Source of row-change notifications
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription>;
}

// ============================================
// Wire frames
// ============================================

/// One Phoenix channel frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn join(topic: &str, filter: &ChangeFilter, access_token: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": {"ack": false, "self": false},
                    "presence": {"key": ""},
                    "postgres_changes": [filter.to_config()],
                },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    fn to_message(&self) -> BackendResult<WsMessage> {
        Ok(WsMessage::Text(serde_json::to_string(self)?))
    }

    /// Status of a `phx_reply` frame (`ok` / `error`)
    fn reply_status(&self) -> Option<&str> {
        if self.event != "phx_reply" {
            return None;
        }
        self.payload.get("status").and_then(|s| s.as_str())
    }
}

/// Decode a `postgres_changes` frame into a change event
pub fn decode_change(frame: &Frame) -> Option<ChangeEvent> {
    if frame.event != "postgres_changes" {
        return None;
    }
    let data = frame.payload.get("data")?;
    let kind: ChangeKind = serde_json::from_value(data.get("type")?.clone()).ok()?;
    let table = data.get("table")?.as_str()?.to_string();
    let record = data.get("record").cloned().unwrap_or_else(|| json!({}));
    Some(ChangeEvent {
        kind,
        table,
        record,
    })
}

// ============================================
// Client
// ============================================

/// Websocket implementation of [`ChangeFeed`]
#[derive(Clone)]
pub struct RealtimeClient {
    backend_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<Session>>>,
}

impl RealtimeClient {
    pub fn new(backend_url: &str, anon_key: &str, session: Arc<RwLock<Option<Session>>>) -> Self {
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session,
        }
    }

    /// Websocket endpoint derived from the project URL
    pub fn socket_url(&self) -> String {
        let base = if let Some(rest) = self.backend_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.backend_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.backend_url.clone()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            base,
            urlencoding::encode(&self.anon_key)
        )
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription> {
        let access_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());

        let (socket, _) = tokio_tungstenite::connect_async(self.socket_url())
            .await
            .map_err(|e| BackendError::Realtime(format!("connect failed: {}", e)))?;
        let (mut sink, mut stream) = socket.split();

        let topic = format!("realtime:{}:{}", filter.table, uuid::Uuid::new_v4().simple());
        sink.send(Frame::join(&topic, &filter, &access_token, 1).to_message()?)
            .await
            .map_err(|e| BackendError::Realtime(e.to_string()))?;

        tokio::time::timeout(JOIN_TIMEOUT, await_join_reply(&mut stream, &topic))
            .await
            .map_err(|_| BackendError::Realtime("join timed out".into()))??;

        tracing::debug!(topic = %topic, filter = ?filter.filter, "Realtime channel joined");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(pump(sink, stream, topic, events_tx, shutdown_rx));

        Ok(Subscription::new(events_rx, move || {
            let _ = shutdown_tx.send(());
        }))
    }
}

/// Read frames until the join for `topic` is acknowledged
async fn await_join_reply<St>(stream: &mut St, topic: &str) -> BackendResult<()>
where
    St: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let message = message.map_err(|e| BackendError::Realtime(e.to_string()))?;
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Frame>(&text) else {
            continue;
        };
        if frame.topic != topic {
            continue;
        }
        match frame.reply_status() {
            Some("ok") => return Ok(()),
            Some(_) => {
                let reason = frame
                    .payload
                    .pointer("/response/reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("join rejected");
                return Err(BackendError::Realtime(reason.to_string()));
            }
            None => continue,
        }
    }
    Err(BackendError::Realtime("socket closed before join".into()))
}

/// Heartbeat, forward change events, and leave on shutdown
async fn pump<S, St>(
    mut sink: S,
    mut stream: St,
    topic: String,
    events: mpsc::UnboundedSender<ChangeEvent>,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
    St: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Ok(leave) = Frame::leave(&topic, next_ref).to_message() {
                    let _ = sink.send(leave).await;
                }
                let _ = sink.close().await;
                tracing::debug!(topic = %topic, "Realtime channel left");
                break;
            }
            _ = heartbeat.tick() => {
                let Ok(beat) = Frame::heartbeat(next_ref).to_message() else { break };
                next_ref += 1;
                if let Err(e) = sink.send(beat).await {
                    tracing::warn!(topic = %topic, "Heartbeat failed: {}", e);
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Frame>(&text) {
                    Ok(frame) => {
                        if let Some(event) = decode_change(&frame) {
                            if events.send(event).is_err() {
                                break;
                            }
                        } else if frame.event == "phx_error" || frame.event == "phx_close" {
                            tracing::warn!(topic = %topic, event = %frame.event, "Realtime channel closed by server");
                            break;
                        } else {
                            tracing::debug!(topic = %frame.topic, event = %frame.event, "Ignoring realtime frame");
                        }
                    }
                    Err(e) => tracing::warn!("Malformed realtime frame: {}", e),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    tracing::info!(topic = %topic, "Realtime socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic = %topic, "Realtime socket error: {}", e);
                    break;
                }
            }
        }
    }
}
