//! HTTP + Server-Sent-Events transport: `GET {base}/events` streams
//! `ChannelEvent`s to a subscriber, `POST {base}/events` accepts one
//! client-to-server `ChannelEvent` per request. Grounded on the same
//! `ClientSink` seam the WebSocket and Unix-socket transports use — here
//! the sink is backed by an unbounded channel feeding an SSE stream instead
//! of a socket write loop.

use crate::channel_event::{ChannelEvent, CHANNEL_EVENTS};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use futures::stream::Stream;
use relaykit_infrastructure::{ClientSink, Gateway, GatewayError};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "userId")]
    user_id: Option<String>,
    token: Option<String>,
}

struct SseClientSink {
    tx: mpsc::UnboundedSender<serde_json::Value>,
    connected: AtomicBool,
}

#[async_trait]
impl ClientSink<serde_json::Value> for SseClientSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, event: serde_json::Value) {
        let _ = self.tx.send(event);
    }

    fn close(&self, _code: u16, _reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Drops trigger gateway disconnection once the client stops polling the
/// stream (browser navigates away, connection resets).
struct DisconnectGuard {
    client_id: String,
    gateway: Arc<Gateway>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let gateway = self.gateway.clone();
        let client_id = self.client_id.clone();
        tokio::spawn(async move {
            gateway.disconnect(&client_id).await;
        });
    }
}

pub async fn events_get(
    Query(query): Query<SseQuery>,
    State(gateway): State<Arc<Gateway>>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, (StatusCode, String)> {
    let client_id = format!("sse-{}-{}", query.session_id, uuid::Uuid::new_v4());
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = Arc::new(SseClientSink { tx, connected: AtomicBool::new(true) });

    gateway
        .connect(&client_id, query.token.as_deref(), sink)
        .await
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    gateway
        .dispatch(&client_id, "subscribe", serde_json::json!({"sessionId": query.session_id}))
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let guard = DisconnectGuard { client_id, gateway };
    let _ = query.user_id;

    let stream = UnboundedReceiverStream::new(rx).map(move |value| {
        let _keep_alive = &guard;
        Ok(Event::default().event(CHANNEL_EVENTS).data(value.to_string()))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn events_post(
    State(gateway): State<Arc<Gateway>>,
    Json(event): Json<ChannelEvent>,
) -> Response {
    let client_id = format!("sse-post-{}", uuid::Uuid::new_v4());
    let sink: Arc<dyn ClientSink<serde_json::Value>> = Arc::new(DiscardSink);

    if gateway.connect(&client_id, None, sink).await.is_err() {
        return (StatusCode::UNAUTHORIZED, "connect rejected").into_response();
    }

    let params = serde_json::json!({
        "sessionId": event.metadata.session_id,
        "message": event.payload.get("message").cloned().unwrap_or(event.payload.clone()),
    });
    let result = gateway.dispatch(&client_id, "send", params).await;
    gateway.disconnect(&client_id).await;

    match result {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => map_dispatch_error(err).into_response(),
    }
}

fn map_dispatch_error(err: GatewayError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err.code {
        relaykit_infrastructure::GatewayErrorCode::Unauthorized
        | relaykit_infrastructure::GatewayErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
        relaykit_infrastructure::GatewayErrorCode::InvalidMessage
        | relaykit_infrastructure::GatewayErrorCode::InvalidParams
        | relaykit_infrastructure::GatewayErrorCode::SessionNotFound => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::to_value(&err).unwrap_or(serde_json::Value::Null)))
}

struct DiscardSink;

#[async_trait]
impl ClientSink<serde_json::Value> for DiscardSink {
    fn is_connected(&self) -> bool {
        true
    }
    async fn send(&self, _event: serde_json::Value) {}
    fn close(&self, _code: u16, _reason: &str) {}
}
