//! In-process transport: a `ClientSink` that collects delivered events in
//! memory instead of writing to a socket. Used by scenario-style tests that
//! drive a `Gateway` directly without opening a real connection.

use async_trait::async_trait;
use relaykit_infrastructure::{ClientSink, Gateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct InProcessSink {
    received: Mutex<Vec<serde_json::Value>>,
    connected: AtomicBool,
    closed_with: Mutex<Option<(u16, String)>>,
}

impl InProcessSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { received: Mutex::new(Vec::new()), connected: AtomicBool::new(true), closed_with: Mutex::new(None) })
    }

    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().expect("received mutex poisoned").clone()
    }

    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed_with.lock().expect("closed_with mutex poisoned").clone()
    }
}

#[async_trait]
impl ClientSink<serde_json::Value> for InProcessSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, event: serde_json::Value) {
        self.received.lock().expect("received mutex poisoned").push(event);
    }

    fn close(&self, code: u16, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        *self.closed_with.lock().expect("closed_with mutex poisoned") = Some((code, reason.to_string()));
    }
}

/// Connects an `InProcessSink` to `gateway` under `client_id`, returning the
/// sink so the caller can inspect what was delivered.
pub async fn connect(gateway: &Gateway, client_id: &str, token: Option<&str>) -> Result<Arc<InProcessSink>, relaykit_infrastructure::GatewayError> {
    let sink = InProcessSink::new();
    gateway.connect(client_id, token, sink.clone()).await?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_collects_sent_events_in_order() {
        let sink = InProcessSink::new();
        sink.send(serde_json::json!({"n": 1})).await;
        sink.send(serde_json::json!({"n": 2})).await;
        assert_eq!(sink.received(), vec![serde_json::json!({"n": 1}), serde_json::json!({"n": 2})]);
    }

    #[tokio::test]
    async fn sink_records_close_code_and_reason() {
        let sink = InProcessSink::new();
        assert!(sink.is_connected());
        sink.close(4008, "buffer overflow");
        assert!(!sink.is_connected());
        assert_eq!(sink.closed_with(), Some((4008, "buffer overflow".to_string())));
    }
}
