//! Host transport: outbound requests correlated to inbound responses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, StreamError};
use crate::host::contract::{
    DisplayMode, HostEnvelope, LogLevel, OutboundEnvelope, OutboundKind,
};

/// How long a request waits for the host's response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote-procedure capabilities the host exposes to the diagram.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Ask the host to switch presentation mode. Returns the mode the host
    /// actually applied.
    async fn request_display_mode(&self, mode: DisplayMode) -> Result<DisplayMode>;

    async fn call_server_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    async fn open_link(&self, url: &str) -> Result<()>;

    /// Fire-and-forget diagnostic message. Never blocks.
    fn send_log(&self, level: LogLevel, message: &str) -> Result<()>;

    /// Publish a render event.
    async fn emit(&self, kind: OutboundKind, payload: Value) -> Result<()>;
}

type PendingMap = HashMap<String, oneshot::Sender<Result<Value>>>;

/// [`HostTransport`] over an mpsc queue of outbound envelopes.
///
/// Each request gets a fresh UUID `request_id` and parks a oneshot sender
/// until [`ChannelTransport::resolve`] is handed the matching `response`.
#[derive(Clone)]
pub struct ChannelTransport {
    outbound_tx: mpsc::Sender<OutboundEnvelope>,
    pending: Arc<Mutex<PendingMap>>,
    request_timeout: Duration,
}

/// Create a transport and the receiver that drains its outbound queue.
#[must_use]
pub fn host_channel(capacity: usize) -> (ChannelTransport, mpsc::Receiver<OutboundEnvelope>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
    (
        ChannelTransport {
            outbound_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        },
        outbound_rx,
    )
}

impl ChannelTransport {
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map_or(0, |p| p.len())
    }

    /// Deliver a host `response` to the request waiting on it.
    ///
    /// Returns `false` when no request with that id is pending.
    pub fn resolve(&self, envelope: HostEnvelope) -> bool {
        let Some(request_id) = envelope.request_id else {
            return false;
        };
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&request_id),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            tracing::debug!(request_id = %request_id, "response for unknown request");
            return false;
        };
        let outcome = match envelope.error {
            Some(message) => Err(StreamError::Host(message)),
            None => Ok(envelope.payload),
        };
        let _ = sender.send(outcome);
        true
    }

    async fn request(&self, kind: OutboundKind, payload: Value) -> Result<Value> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| StreamError::Channel("pending request table poisoned".into()))?
            .insert(request_id.clone(), tx);

        let envelope = OutboundEnvelope::request(request_id.clone(), kind, payload);
        if let Err(e) = self.outbound_tx.send(envelope).await {
            self.forget(&request_id);
            return Err(StreamError::Channel(format!(
                "failed to send {} request: {e}",
                kind.as_str()
            )));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(StreamError::Channel(format!(
                "{} response dropped",
                kind.as_str()
            ))),
            Err(_) => {
                self.forget(&request_id);
                Err(StreamError::Host(format!(
                    "{} timed out after {:?}",
                    kind.as_str(),
                    self.request_timeout
                )))
            }
        }
    }

    fn forget(&self, request_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }
}

/// Only http(s) links may be handed to the host.
pub fn validate_link(raw: &str) -> Result<url::Url> {
    let parsed =
        url::Url::parse(raw).map_err(|e| StreamError::Host(format!("invalid link {raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(StreamError::Host(format!(
            "refusing to open {other} link"
        ))),
    }
}

#[async_trait]
impl HostTransport for ChannelTransport {
    async fn request_display_mode(&self, mode: DisplayMode) -> Result<DisplayMode> {
        let reply = self
            .request(OutboundKind::RequestDisplayMode, json!({ "mode": mode }))
            .await?;
        reply
            .get("mode")
            .and_then(Value::as_str)
            .and_then(DisplayMode::parse)
            .ok_or_else(|| StreamError::Host(format!("malformed display mode reply: {reply}")))
    }

    async fn call_server_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.request(
            OutboundKind::CallServerTool,
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    async fn open_link(&self, url: &str) -> Result<()> {
        let url = validate_link(url)?;
        self.request(OutboundKind::OpenLink, json!({ "url": url.as_str() }))
            .await
            .map(|_| ())
    }

    fn send_log(&self, level: LogLevel, message: &str) -> Result<()> {
        let envelope = OutboundEnvelope::event(
            OutboundKind::SendLog,
            json!({ "level": level, "data": message }),
        );
        self.outbound_tx
            .try_send(envelope)
            .map_err(|e| StreamError::Channel(format!("log dropped: {e}")))
    }

    async fn emit(&self, kind: OutboundKind, payload: Value) -> Result<()> {
        self.outbound_tx
            .send(OutboundEnvelope::event(kind, payload))
            .await
            .map_err(|e| StreamError::Channel(format!("failed to emit {}: {e}", kind.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answer the first `limit` envelopes on `rx` with `reply(kind)`.
    fn spawn_host(
        transport: ChannelTransport,
        mut rx: mpsc::Receiver<OutboundEnvelope>,
        limit: usize,
        reply: fn(OutboundKind) -> std::result::Result<Value, String>,
    ) -> tokio::task::JoinHandle<Vec<OutboundEnvelope>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < limit
                && let Some(envelope) = rx.recv().await
            {
                if let Some(id) = envelope.request_id.clone() {
                    let response = match reply(envelope.kind) {
                        Ok(payload) => HostEnvelope::response(id, payload),
                        Err(message) => HostEnvelope::response_error(id, message),
                    };
                    transport.resolve(response);
                }
                seen.push(envelope);
            }
            seen
        })
    }

    #[tokio::test]
    async fn display_mode_round_trip() {
        let (transport, rx) = host_channel(8);
        let host = spawn_host(transport.clone(), rx, 1, |_| Ok(json!({ "mode": "fullscreen" })));
        let mode = transport
            .request_display_mode(DisplayMode::Fullscreen)
            .await
            .expect("request in test");
        assert_eq!(mode, DisplayMode::Fullscreen);
        assert_eq!(transport.pending_count(), 0);
        let seen = host.await.expect("join in test");
        assert_eq!(seen[0].kind, OutboundKind::RequestDisplayMode);
        assert_eq!(seen[0].payload["mode"], "fullscreen");
    }

    #[tokio::test]
    async fn host_rejection_is_host_error() {
        let (transport, rx) = host_channel(8);
        let _host = spawn_host(transport.clone(), rx, 1, |_| Err("denied".into()));
        match transport.call_server_tool("save", json!({})).await {
            Err(StreamError::Host(msg)) => assert_eq!(msg, "denied"),
            other => unreachable!("expected host error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let (transport, _rx) = host_channel(8);
        let transport = transport.with_request_timeout(Duration::from_millis(10));
        let result = transport.request_display_mode(DisplayMode::Inline).await;
        assert!(matches!(result, Err(StreamError::Host(_))));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn open_link_rejects_non_http() {
        let (transport, _rx) = host_channel(8);
        assert!(transport.open_link("javascript:alert(1)").await.is_err());
        assert!(transport.open_link("not a url").await.is_err());
        assert!(validate_link("https://example.com/a").is_ok());
    }

    #[tokio::test]
    async fn send_log_is_a_notification() {
        let (transport, mut rx) = host_channel(8);
        transport
            .send_log(LogLevel::Warning, "careful")
            .expect("send in test");
        let envelope = rx.recv().await.expect("envelope in test");
        assert_eq!(envelope.kind, OutboundKind::SendLog);
        assert!(envelope.request_id.is_none());
        assert_eq!(envelope.payload["level"], "warning");
        assert_eq!(envelope.payload["data"], "careful");
    }

    #[test]
    fn unknown_response_is_ignored() {
        let (transport, _rx) = host_channel(1);
        assert!(!transport.resolve(HostEnvelope::response("nope", Value::Null)));
    }
}
