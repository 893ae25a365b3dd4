//! The JSON frame vocabulary shared by the WebSocket and Unix-socket
//! transports — same wire schema, different framing (WebSocket text frames
//! vs. newline-delimited JSON).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Connect { #[serde(rename = "clientId")] client_id: String, token: Option<String>, metadata: Option<serde_json::Value> },
    Req { id: String, method: String, params: serde_json::Value },
    Ping { timestamp: i64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "connected")]
    Connected { #[serde(rename = "gatewayId")] gateway_id: String, apps: Vec<String>, sessions: Vec<String> },
    #[serde(rename = "res")]
    Res {
        id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<serde_json::Value>,
    },
    #[serde(rename = "event")]
    Event { event: String, #[serde(rename = "sessionId")] session_id: String, data: serde_json::Value },
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

pub const CLOSE_AUTH_FAILED: u16 = 4001;
pub const CLOSE_BUFFER_OVERFLOW: u16 = 4008;
pub const CLOSE_SERVER_SHUTDOWN: u16 = 1001;
