//! Unix domain socket transport: newline-delimited JSON, same frame
//! vocabulary as the WebSocket transport. Framing discipline is a
//! `writer: Mutex<BufWriter<...>>` serializing writes and a reader loop
//! pulling one message at a time, simplified from Content-Length-prefixed
//! JSON-RPC to one JSON object per line, since a local socket has no
//! HTTP-style framing to honor.

use crate::frame::{ClientFrame, ServerFrame, CLOSE_AUTH_FAILED};
use async_trait::async_trait;
use relaykit_infrastructure::{ClientSink, Gateway};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{unix::OwnedWriteHalf, UnixListener};
use tokio::sync::Mutex;
use tracing::{info, warn};

struct UnixSocketSink {
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
    connected: AtomicBool,
}

#[async_trait]
impl ClientSink<serde_json::Value> for UnixSocketSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, event: serde_json::Value) {
        self.write_frame(&event).await;
    }

    fn close(&self, _code: u16, _reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl UnixSocketSink {
    async fn write_frame(&self, value: &serde_json::Value) {
        let Ok(mut line) = serde_json::to_string(value) else { return };
        line.push('\n');
        let mut writer = self.writer.lock().await;
        if writer.write_all(line.as_bytes()).await.is_err() || writer.flush().await.is_err() {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    async fn write_server_frame(&self, frame: &ServerFrame) {
        match serde_json::to_value(frame) {
            Ok(value) => self.write_frame(&value).await,
            Err(e) => warn!("failed to serialize server frame: {e}"),
        }
    }
}

/// Bind and accept connections until the process shuts down. Each connection
/// runs its own read loop; frames are dispatched through `gateway` exactly
/// like the WebSocket transport.
pub async fn serve(path: impl AsRef<Path>, gateway: Arc<Gateway>) -> std::io::Result<()> {
    let path = path.as_ref();
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "unix socket transport listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let gateway = gateway.clone();
        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            handle_connection(read_half, write_half, gateway).await;
        });
    }
}

async fn handle_connection(
    read_half: tokio::net::unix::OwnedReadHalf,
    write_half: OwnedWriteHalf,
    gateway: Arc<Gateway>,
) {
    let sink = Arc::new(UnixSocketSink { writer: Mutex::new(BufWriter::new(write_half)), connected: AtomicBool::new(false) });
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let mut client_id: Option<String> = None;
    let mut authenticated = false;

    loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => {
                warn!("unix socket read error: {e}");
                break;
            }
        };
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let frame: ClientFrame = match serde_json::from_str(trimmed) {
            Ok(f) => f,
            Err(e) => {
                sink.write_server_frame(&ServerFrame::Error { code: "INVALID_MESSAGE".into(), message: e.to_string() }).await;
                continue;
            }
        };

        match frame {
            ClientFrame::Connect { client_id: id, token, .. } => match gateway.connect(&id, token.as_deref(), sink.clone()).await {
                Ok(()) => {
                    sink.connected.store(true, Ordering::SeqCst);
                    client_id = Some(id);
                    authenticated = true;
                    sink.write_server_frame(&ServerFrame::Connected { gateway_id: "relaykit-gateway".into(), apps: Vec::new(), sessions: Vec::new() }).await;
                }
                Err(e) => {
                    sink.write_server_frame(&ServerFrame::Error { code: "AUTH_FAILED".into(), message: e.to_string() }).await;
                    sink.close(CLOSE_AUTH_FAILED, "authentication failed");
                    break;
                }
            },
            ClientFrame::Ping { timestamp } => {
                sink.write_server_frame(&ServerFrame::Pong { timestamp }).await;
            }
            ClientFrame::Req { id, method, params } => {
                if !authenticated {
                    sink.write_server_frame(&ServerFrame::Error { code: "AUTH_FAILED".into(), message: "connect first".into() }).await;
                    break;
                }
                let client_id = client_id.clone().expect("authenticated implies client_id is set");
                let response = match gateway.dispatch(&client_id, &method, params).await {
                    Ok(payload) => ServerFrame::Res { id, ok: true, payload: Some(payload), error: None },
                    Err(err) => ServerFrame::Res { id, ok: false, payload: None, error: Some(serde_json::to_value(&err).unwrap_or(serde_json::Value::Null)) },
                };
                sink.write_server_frame(&response).await;
            }
        }
    }

    if let Some(id) = client_id {
        gateway.disconnect(&id).await;
        info!(client_id = %id, "unix socket client disconnected");
    }
}
