//! Minimal Socket.IO-flavored shim: exposes exactly two event names over a
//! plain WebSocket upgrade (`"<ns>:join"` to subscribe, `"<ns>:event"` for
//! delivered `ChannelEvent`s). This is not an Engine.IO/Socket.IO protocol
//! implementation — no crate in the reference corpus speaks that protocol,
//! and pulling one in from outside it would be fabricating a dependency.
//! Kept for callers who only need Socket.IO-shaped event names and already
//! terminate a real Socket.IO handshake in front of this process.

use crate::channel_event::{ChannelEvent, ChannelEventMetadata};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use relaykit_infrastructure::{ClientSink, Gateway};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SocketIoFrame {
    event: String,
    data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SocketIoEmit<'a> {
    event: &'a str,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JoinPayload {
    #[serde(rename = "sessionId")]
    session_id: String,
    metadata: Option<serde_json::Value>,
}

struct SocketIoSink {
    tx: mpsc::UnboundedSender<Message>,
    connected: AtomicBool,
}

#[async_trait]
impl ClientSink<serde_json::Value> for SocketIoSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, event: serde_json::Value) {
        let _ = self.tx.send(Message::Text(event.to_string()));
    }

    fn close(&self, _code: u16, _reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Message::Close(None));
    }
}

/// Route: `GET {base}/socket.io/:namespace` upgraded to a WebSocket.
pub async fn socketio_handler(
    Path(namespace): Path<String>,
    ws: WebSocketUpgrade,
    State(gateway): State<Arc<Gateway>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socketio(socket, namespace, gateway))
}

async fn handle_socketio(socket: WebSocket, namespace: String, gateway: Arc<Gateway>) {
    let (mut sender, mut receiver) = futures::StreamExt::split(socket);
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let should_stop = matches!(msg, Message::Close(_));
            if futures::SinkExt::send(&mut sender, msg).await.is_err() {
                break;
            }
            if should_stop {
                break;
            }
        }
    });

    let join_event = format!("{namespace}:join");
    let emit_event = format!("{namespace}:event");
    let sink = Arc::new(SocketIoSink { tx: tx.clone(), connected: AtomicBool::new(false) });
    let client_id = format!("socketio-{}-{}", namespace, uuid::Uuid::new_v4());
    let mut joined = false;

    while let Some(Ok(msg)) = futures::StreamExt::next(&mut receiver).await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        let frame: SocketIoFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!("socket.io shim: invalid frame: {e}");
                continue;
            }
        };

        if frame.event != join_event {
            warn!(event = %frame.event, "socket.io shim: ignoring unsupported event name");
            continue;
        }

        let Ok(payload) = serde_json::from_value::<JoinPayload>(frame.data) else {
            continue;
        };

        if !joined {
            if gateway.connect(&client_id, None, sink.clone()).await.is_err() {
                break;
            }
            sink.connected.store(true, Ordering::SeqCst);
            joined = true;
        }

        if gateway
            .dispatch(&client_id, "subscribe", serde_json::json!({"sessionId": payload.session_id}))
            .await
            .is_err()
        {
            continue;
        }

        let metadata = ChannelEventMetadata { session_id: payload.session_id.clone(), user_id: None, timestamp: now() };
        let _ = payload.metadata;
        let ack = ChannelEvent {
            channel: namespace.clone(),
            event_type: "joined".to_string(),
            payload: serde_json::json!({"sessionId": payload.session_id}),
            metadata,
        };
        let emit = SocketIoEmit { event: &emit_event, data: serde_json::to_value(&ack).unwrap_or_default() };
        let _ = tx.send(Message::Text(serde_json::to_string(&emit).unwrap_or_default()));
    }

    if joined {
        gateway.disconnect(&client_id).await;
        info!(client_id = %client_id, "socket.io shim client disconnected");
    }
    writer.abort();
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
