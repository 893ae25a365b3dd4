//! Enabled transports from TOML (`[transport]` section)

use serde::{Deserialize, Serialize};

/// Raw transport configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTransportConfig {
    /// Names drawn from `websocket`, `http_sse`, `unix_socket`, `socketio`,
    /// `in_process`. Unknown names are rejected at startup, not here.
    pub enabled: Vec<String>,
    /// Unix socket path, used only when `unix_socket` is enabled
    pub unix_socket_path: Option<String>,
}

impl Default for FileTransportConfig {
    fn default() -> Self {
        Self { enabled: vec!["websocket".to_string(), "http_sse".to_string()], unix_socket_path: None }
    }
}
