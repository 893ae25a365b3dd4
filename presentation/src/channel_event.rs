//! The wire shape shared by HTTP+SSE, the Socket.IO shim, and in-process
//! tests: a channel name, a type tag, an opaque payload, and metadata. Two
//! reserved channels: `events` (server→client stream) and `messages`
//! (client→server steering).

use serde::{Deserialize, Serialize};

pub const CHANNEL_EVENTS: &str = "events";
pub const CHANNEL_MESSAGES: &str = "messages";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEventMetadata {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub metadata: ChannelEventMetadata,
}

impl ChannelEvent {
    pub fn now_metadata(session_id: impl Into<String>, user_id: Option<String>) -> ChannelEventMetadata {
        ChannelEventMetadata {
            session_id: session_id.into(),
            user_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}
