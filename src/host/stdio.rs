//! Line-delimited JSON bridge between a host and one [`DiagramSession`].
//!
//! Reads [`HostEnvelope`] lines from the input stream and writes
//! [`OutboundEnvelope`] lines to the output stream. Stdout is reserved for
//! the protocol when run over stdio; diagnostics go to stderr.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    Lines,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::checkpoint::store_from_config;
use crate::config::InkConfig;
use crate::error::{Result, StreamError};
use crate::host::channel::{ChannelTransport, HostTransport, host_channel};
use crate::host::contract::{
    HostEnvelope, InboundKind, OutboundEnvelope, OutboundKind, ViewportPayload,
};
use crate::session::{DiagramSession, SessionParts};

/// Run the bridge over the process's stdin and stdout with the reference
/// headless capabilities.
pub async fn run_stdio_bridge(config: &InkConfig) -> Result<()> {
    let store = store_from_config(&config.checkpoint)?;
    let parts = SessionParts::headless(config, store);
    run_bridge(config, parts, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run the bridge until the input stream closes or the session fails.
///
/// Four tasks cooperate:
///
/// 1. **Writer** drains the outbound queue and writes one JSON line each.
/// 2. **Reader** (this task) parses inbound lines, resolves `response`
///    envelopes directly on the transport, and queues everything else.
/// 3. **Session** handles queued envelopes one at a time.
/// 4. **Viewport forwarder** publishes camera changes as `render.viewport`.
///
/// Responses bypass the session queue so a session blocked on a host
/// request can still be answered. The reader never waits on a full queue:
/// it keeps reading into a local backlog and hands envelopes to the session
/// as room frees up.
///
/// Fails with [`StreamError::Connection`] when no line arrives within the
/// configured connect timeout.
pub async fn run_bridge<R, W>(
    config: &InkConfig,
    parts: SessionParts,
    input: R,
    output: W,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (transport, outbound_rx) = host_channel(config.host.request_capacity);
    let writer_handle = tokio::spawn(run_writer(outbound_rx, output));
    let mut lines = BufReader::new(input).lines();

    let timeout = config.host.connect_timeout();
    let first = match tokio::time::timeout(timeout, next_line(&mut lines)).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
            return fail_connect(transport, writer_handle, "input closed before host connected")
                .await;
        }
        Ok(Err(e)) => return fail_connect(transport, writer_handle, &e.to_string()).await,
        Err(_) => {
            let reason = format!("host did not connect within {timeout:?}");
            return fail_connect(transport, writer_handle, &reason).await;
        }
    };
    tracing::info!("host connected");

    let session = DiagramSession::new(config, parts, Arc::new(transport.clone()));
    let viewport_handle = spawn_viewport_forwarder(&session, transport.clone());

    let (event_tx, event_rx) = mpsc::channel(config.host.event_capacity.max(1));
    let session_handle = tokio::spawn(run_session(session, event_rx));

    let mut backlog = VecDeque::new();
    route_line(&transport, &first, &mut backlog).await;
    let mut input_open = true;

    while input_open || !backlog.is_empty() {
        tokio::select! {
            line = next_line(&mut lines), if input_open => match line {
                Ok(Some(line)) => route_line(&transport, &line, &mut backlog).await,
                Ok(None) => {
                    tracing::info!("input closed; shutting down bridge");
                    input_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input read failed; shutting down bridge");
                    input_open = false;
                }
            },
            permit = event_tx.reserve(), if !backlog.is_empty() => match permit {
                Ok(permit) => {
                    if let Some(envelope) = backlog.pop_front() {
                        permit.send(envelope);
                    }
                }
                Err(_) => {
                    tracing::warn!("session stopped; shutting down bridge");
                    break;
                }
            },
        }
    }

    drop(event_tx);
    let session_result = match session_handle.await {
        Ok(result) => result,
        Err(e) => Err(StreamError::Channel(format!("session task failed: {e}"))),
    };

    viewport_handle.abort();
    let _ = viewport_handle.await;
    if let Err(e) = &session_result {
        let _ = transport
            .emit(OutboundKind::SessionError, json!({ "message": e.to_string() }))
            .await;
    }
    drop(transport);
    let _ = writer_handle.await;

    session_result
}

async fn run_session(
    mut session: DiagramSession,
    mut events: mpsc::Receiver<HostEnvelope>,
) -> Result<()> {
    let mut outcome = Ok(());
    while let Some(envelope) = events.recv().await {
        if let Err(e) = session.handle(envelope).await {
            tracing::error!(error = %e, "session failed");
            outcome = Err(e);
            break;
        }
    }
    session.shutdown();
    outcome
}

fn spawn_viewport_forwarder(
    session: &DiagramSession,
    transport: ChannelTransport,
) -> JoinHandle<()> {
    let mut views = session.subscribe_viewport();
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = *views.borrow_and_update();
            let Some(view_box) = view else {
                continue;
            };
            let payload = json!(ViewportPayload { view_box });
            if transport
                .emit(OutboundKind::RenderViewport, payload)
                .await
                .is_err()
            {
                break;
            }
        }
    })
}

/// Resolve a `response` line on the transport, or queue any other envelope
/// for the session.
async fn route_line(
    transport: &ChannelTransport,
    line: &str,
    backlog: &mut VecDeque<HostEnvelope>,
) {
    let Some(envelope) = parse_envelope(transport, line).await else {
        return;
    };
    if envelope.kind == InboundKind::Response {
        transport.resolve(envelope);
    } else {
        backlog.push_back(envelope);
    }
}

/// Parse one inbound line. Malformed lines are reported to the host and
/// skipped.
async fn parse_envelope(transport: &ChannelTransport, line: &str) -> Option<HostEnvelope> {
    let error = match serde_json::from_str::<HostEnvelope>(line) {
        Ok(envelope) => match envelope.validate() {
            Ok(()) => return Some(envelope),
            Err(e) => e.to_string(),
        },
        Err(e) => format!("failed to parse host envelope: {e}"),
    };
    tracing::warn!(error = %error, raw_line = %line, "rejected inbound line");
    let _ = transport
        .emit(OutboundKind::SessionError, json!({ "message": error }))
        .await;
    None
}

async fn fail_connect(
    transport: ChannelTransport,
    writer_handle: JoinHandle<()>,
    reason: &str,
) -> Result<()> {
    tracing::error!(reason, "host connection failed");
    let _ = transport
        .emit(OutboundKind::SessionError, json!({ "message": reason }))
        .await;
    drop(transport);
    let _ = writer_handle.await;
    Err(StreamError::Connection(reason.to_owned()))
}

async fn run_writer<W>(mut outbound: mpsc::Receiver<OutboundEnvelope>, output: W)
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(output);
    while let Some(envelope) = outbound.recv().await {
        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize outbound envelope; skipping");
                continue;
            }
        };
        if let Err(e) = write_line(&mut writer, &json).await {
            tracing::warn!(error = %e, "output closed; stopping writer");
            break;
        }
    }
}

/// Next non-blank line, or `None` at end of input.
///
/// Safe to cancel: a line is either returned whole or left unread.
async fn next_line<R>(lines: &mut Lines<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| StreamError::Channel(format!("failed to read host input: {e}")))?;
        let Some(line) = line else {
            return Ok(None);
        };
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_owned()));
        }
    }
}

/// Write a single JSON line and flush.
async fn write_line<W>(writer: &mut BufWriter<W>, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| StreamError::Channel(format!("failed to write host output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| StreamError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| StreamError::Channel(format!("failed to flush host output: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::test_utils::fast_config;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, duplex};

    fn parts(config: &InkConfig) -> SessionParts {
        SessionParts::headless(config, Arc::new(MemoryCheckpointStore::new()))
    }

    fn kinds(output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .filter_map(|v| v["kind"].as_str().map(str::to_owned))
            .collect()
    }

    #[tokio::test]
    async fn next_line_skips_blank_lines() {
        let input: &[u8] = b"\n  \n{\"a\":1}\n";
        let mut lines = input.lines();
        let line = next_line(&mut lines).await.expect("read in test");
        assert_eq!(line.as_deref(), Some("{\"a\":1}"));
        assert!(next_line(&mut lines).await.expect("read in test").is_none());
    }

    #[tokio::test]
    async fn silent_host_fails_with_connection_error() {
        let mut config = fast_config();
        config.host.connect_timeout_ms = 20;
        let (_host_in, bridge_in) = duplex(1 << 16);
        let (bridge_out, mut host_out) = duplex(1 << 16);

        let result = run_bridge(&config, parts(&config), bridge_in, bridge_out).await;
        assert!(matches!(result, Err(StreamError::Connection(_))));

        let mut output = String::new();
        host_out.read_to_string(&mut output).await.expect("read in test");
        assert_eq!(kinds(&output), vec!["session.error".to_owned()]);
    }

    #[tokio::test]
    async fn closed_input_before_first_line_is_a_connection_error() {
        let config = fast_config();
        let (bridge_out, _host_out) = duplex(1 << 16);
        let result = run_bridge(&config, parts(&config), tokio::io::empty(), bridge_out).await;
        assert!(matches!(result, Err(StreamError::Connection(_))));
    }

    #[tokio::test]
    async fn tool_input_produces_frame_and_malformed_lines_are_reported() {
        let config = fast_config();
        let (mut host_in, bridge_in) = duplex(1 << 16);
        let (bridge_out, mut host_out) = duplex(1 << 20);

        let input = HostEnvelope::new(
            InboundKind::ToolInput,
            json!({"elements": [{"type":"rectangle","id":"r","x":0,"y":0,"width":40,"height":20}]}),
        );
        let mut script = serde_json::to_string(&input).expect("serialize in test");
        script.push_str("\nnot json\n");
        host_in.write_all(script.as_bytes()).await.expect("write in test");
        drop(host_in);

        run_bridge(&config, parts(&config), bridge_in, bridge_out)
            .await
            .expect("bridge in test");

        let mut output = String::new();
        host_out.read_to_string(&mut output).await.expect("read in test");
        let kinds = kinds(&output);
        assert!(kinds.iter().any(|k| k == "render.frame"));
        assert!(kinds.iter().any(|k| k == "session.error"));
    }
}
