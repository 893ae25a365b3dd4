//! Client-side leader election over a shared broadcast bus, for the case
//! where many local peers (browser tabs, in-process clients) want to share
//! one physical gateway connection. Grounded on the pack's
//! `sven-node::http::ws::handle_socket`, which fans one `agent.subscribe()`
//! broadcast stream out to many WebSocket peers and handles
//! `RecvError::Lagged`/`RecvError::Closed` explicitly; a follower here plays
//! the same role a WebSocket peer plays there, just against a local bus
//! instead of a socket.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{timeout, Duration};
use tracing::warn;

pub const DEFAULT_ELECTION_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "leader:collecting_subscriptions")]
    LeaderCollectingSubscriptions { tab_id: String },
    #[serde(rename = "leader:transport_ready")]
    LeaderTransportReady { tab_id: String },
    #[serde(rename = "ping:leader")]
    PingLeader { tab_id: String },
    #[serde(rename = "pong:leader")]
    PongLeader { tab_id: String },
    #[serde(rename = "subscriptions:announce")]
    SubscriptionsAnnounce { tab_id: String, sessions: Vec<String>, channels: Vec<String> },
    #[serde(rename = "request")]
    Request { request_id: String, tab_id: String, session_id: Option<String>, kind: String, params: serde_json::Value },
    #[serde(rename = "response")]
    Response { request_id: String, ok: bool, result: Option<serde_json::Value>, error: Option<serde_json::Value> },
    #[serde(rename = "event")]
    Event { event: serde_json::Value },
    #[serde(rename = "stream:event")]
    StreamEvent { request_id: String, event: serde_json::Value },
    #[serde(rename = "stream:end")]
    StreamEnd { request_id: String },
    #[serde(rename = "stream:error")]
    StreamError { request_id: String, error: String },
}

/// The broadcast bus itself: any FIFO, reliable, in-order multicast across
/// local peers. Backed by `tokio::sync::broadcast`, the same primitive the
/// teacher uses to fan `ControlEvent`s out to every connected operator.
#[derive(Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<BridgeMessage>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, msg: BridgeMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn next_request_id(tab_id: &str, counter: &std::sync::atomic::AtomicU64) -> String {
    let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    format!("{tab_id}-{n}")
}

/// One peer's view of the shared bus: either the leader, who owns the
/// physical transport, or a follower, who forwards requests and waits for
/// targeted responses.
pub struct MultiplexerTab {
    tab_id: String,
    bus: BroadcastBus,
    is_leader: Arc<Mutex<bool>>,
    request_counter: std::sync::atomic::AtomicU64,
}

impl MultiplexerTab {
    pub fn new(tab_id: impl Into<String>, bus: BroadcastBus) -> Self {
        Self {
            tab_id: tab_id.into(),
            bus,
            is_leader: Arc::new(Mutex::new(false)),
            request_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub async fn is_leader(&self) -> bool {
        *self.is_leader.lock().await
    }

    /// Run the election handshake: announce intent to lead, collect
    /// `subscriptions:announce` replies from every other live tab within
    /// `timeout_duration`, then declare the transport ready. Returns the
    /// merged session/channel set every tab reported, so the new leader can
    /// re-subscribe on the physical transport before answering traffic.
    pub async fn elect_leader(&self, timeout_duration: Duration) -> (Vec<String>, Vec<String>) {
        let mut rx = self.bus.subscribe();
        self.bus.publish(BridgeMessage::LeaderCollectingSubscriptions { tab_id: self.tab_id.clone() });

        let mut sessions = std::collections::HashSet::new();
        let mut channels = std::collections::HashSet::new();
        let deadline = tokio::time::Instant::now() + timeout_duration;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Ok(BridgeMessage::SubscriptionsAnnounce { sessions: s, channels: c, .. })) => {
                    sessions.extend(s);
                    channels.extend(c);
                }
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(tab_id = %self.tab_id, "multiplexer election lagged by {n} messages");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => break,
            }
        }

        *self.is_leader.lock().await = true;
        self.bus.publish(BridgeMessage::LeaderTransportReady { tab_id: self.tab_id.clone() });
        (sessions.into_iter().collect(), channels.into_iter().collect())
    }

    /// A follower announces its current subscriptions in response to a new
    /// leader's election call. No-op for the leader itself.
    pub fn announce_subscriptions(&self, sessions: Vec<String>, channels: Vec<String>) {
        self.bus.publish(BridgeMessage::SubscriptionsAnnounce { tab_id: self.tab_id.clone(), sessions, channels });
    }

    /// Forward a request onto the bus and await the targeted `response`. Only
    /// meaningful for a follower; the leader executes requests locally
    /// instead of calling this. Filters out every bus message that isn't the
    /// matching `response`, the same way a follower ignores `event`s destined
    /// for other tabs.
    pub async fn forward_request(
        &self,
        kind: &str,
        session_id: Option<String>,
        params: serde_json::Value,
    ) -> BridgeMessage {
        let request_id = next_request_id(&self.tab_id, &self.request_counter);
        let mut rx = self.bus.subscribe();
        self.bus.publish(BridgeMessage::Request {
            request_id: request_id.clone(),
            tab_id: self.tab_id.clone(),
            session_id,
            kind: kind.to_string(),
            params,
        });

        loop {
            match rx.recv().await {
                Ok(BridgeMessage::Response { request_id: rid, ok, result, error }) if rid == request_id => {
                    return BridgeMessage::Response { request_id: rid, ok, result, error };
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(tab_id = %self.tab_id, "multiplexer follower lagged by {n} messages awaiting response");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return BridgeMessage::Response {
                        request_id,
                        ok: false,
                        result: None,
                        error: Some(serde_json::json!({"message": "leader disappeared before responding"})),
                    };
                }
            }
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_tab_elects_itself_leader_after_timeout() {
        let bus = BroadcastBus::new(64);
        let tab = MultiplexerTab::new("tab-1", bus);
        let (sessions, channels) = tab.elect_leader(Duration::from_millis(30)).await;
        assert!(tab.is_leader().await);
        assert!(sessions.is_empty());
        assert!(channels.is_empty());
    }

    #[tokio::test]
    async fn follower_announcement_is_collected_by_the_electing_leader() {
        let bus = BroadcastBus::new(64);
        let leader = MultiplexerTab::new("tab-leader", bus.clone());
        let follower = MultiplexerTab::new("tab-follower", bus.clone());

        let mut follower_rx = follower.bus().subscribe();
        let election = tokio::spawn(async move { leader.elect_leader(Duration::from_millis(150)).await });

        // Wait for the collecting_subscriptions announcement before replying.
        loop {
            match follower_rx.recv().await.unwrap() {
                BridgeMessage::LeaderCollectingSubscriptions { .. } => break,
                _ => continue,
            }
        }
        follower.announce_subscriptions(vec!["sess-1".into()], vec!["chan-a".into()]);

        let (sessions, channels) = election.await.unwrap();
        assert_eq!(sessions, vec!["sess-1".to_string()]);
        assert_eq!(channels, vec!["chan-a".to_string()]);
    }

    #[tokio::test]
    async fn forwarded_request_resolves_once_response_arrives() {
        let bus = BroadcastBus::new(64);
        let follower = MultiplexerTab::new("tab-follower", bus.clone());
        let mut leader_rx = bus.subscribe();

        let follower_clone_bus = bus.clone();
        let forward = tokio::spawn(async move { follower.forward_request("send", Some("sess-1".into()), serde_json::json!({"message": "hi"})).await });

        let request_id = loop {
            match leader_rx.recv().await.unwrap() {
                BridgeMessage::Request { request_id, .. } => break request_id,
                _ => continue,
            }
        };
        follower_clone_bus.publish(BridgeMessage::Response { request_id, ok: true, result: Some(serde_json::json!({"messageId": "m1"})), error: None });

        match forward.await.unwrap() {
            BridgeMessage::Response { ok, result, .. } => {
                assert!(ok);
                assert_eq!(result.unwrap()["messageId"], "m1");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
