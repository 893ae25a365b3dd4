//! WebSocket transport: bidirectional JSON frames over `axum`'s `ws` feature.
//! Grounded on the pack's `sven-node::http::ws::handle_socket`, which splits
//! a socket into a read loop and a `broadcast::Receiver` forwarding loop; here
//! the forwarding side is a `ClientSink` backed by an unbounded channel so the
//! gateway can push events from any context, not just the connection task.

use crate::frame::{ClientFrame, ServerFrame, CLOSE_AUTH_FAILED};
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use relaykit_infrastructure::{ClientSink, Gateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(gateway): State<Arc<Gateway>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

struct WsClientSink {
    tx: mpsc::UnboundedSender<Message>,
    connected: AtomicBool,
}

#[async_trait]
impl ClientSink<serde_json::Value> for WsClientSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, event: serde_json::Value) {
        let _ = self.tx.send(Message::Text(event.to_string()));
    }

    fn close(&self, code: u16, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Message::Close(Some(CloseFrame { code, reason: reason.to_string().into() })));
    }
}

pub async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>) {
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

    let sink = Arc::new(WsClientSink { tx: tx.clone(), connected: AtomicBool::new(false) });
    let mut client_id: Option<String> = None;
    let mut authenticated = false;

    while let Some(Ok(msg)) = futures::StreamExt::next(&mut receiver).await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                let _ = tx.send(frame_to_message(&ServerFrame::Error { code: "INVALID_MESSAGE".into(), message: e.to_string() }));
                continue;
            }
        };

        match frame {
            ClientFrame::Connect { client_id: id, token, .. } => {
                match gateway.connect(&id, token.as_deref(), sink.clone()).await {
                    Ok(()) => {
                        sink.connected.store(true, Ordering::SeqCst);
                        client_id = Some(id.clone());
                        authenticated = true;
                        let _ = tx.send(frame_to_message(&ServerFrame::Connected {
                            gateway_id: "relaykit-gateway".into(),
                            apps: Vec::new(),
                            sessions: Vec::new(),
                        }));
                    }
                    Err(e) => {
                        let _ = tx.send(frame_to_message(&ServerFrame::Error { code: "AUTH_FAILED".into(), message: e.to_string() }));
                        sink.close(CLOSE_AUTH_FAILED, "authentication failed");
                        break;
                    }
                }
            }
            ClientFrame::Ping { timestamp } => {
                let _ = tx.send(frame_to_message(&ServerFrame::Pong { timestamp }));
            }
            ClientFrame::Req { id, method, params } => {
                if !authenticated {
                    let _ = tx.send(frame_to_message(&ServerFrame::Error { code: "AUTH_FAILED".into(), message: "connect first".into() }));
                    sink.close(CLOSE_AUTH_FAILED, "unauthenticated request");
                    break;
                }
                let client_id = client_id.clone().expect("authenticated implies client_id is set");
                match gateway.dispatch(&client_id, &method, params).await {
                    Ok(payload) => {
                        let _ = tx.send(frame_to_message(&ServerFrame::Res { id, ok: true, payload: Some(payload), error: None }));
                    }
                    Err(err) => {
                        let _ = tx.send(frame_to_message(&ServerFrame::Res {
                            id,
                            ok: false,
                            payload: None,
                            error: Some(serde_json::to_value(&err).unwrap_or(serde_json::Value::Null)),
                        }));
                    }
                }
            }
        }
    }

    if let Some(id) = client_id {
        gateway.disconnect(&id).await;
        info!(client_id = %id, "websocket client disconnected");
    }
    writer.abort();
}

fn frame_to_message(frame: &ServerFrame) -> Message {
    match serde_json::to_string(frame) {
        Ok(text) => Message::Text(text),
        Err(e) => {
            warn!("failed to serialize server frame: {e}");
            Message::Text("{\"type\":\"error\",\"code\":\"INTERNAL\",\"message\":\"serialization failure\"}".to_string())
        }
    }
}
