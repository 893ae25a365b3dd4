//! Gateway configuration from TOML (`[gateway]` section)

use crate::gateway::OverflowPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOverflowPolicy {
    Disconnect,
    DropOldest,
}

impl From<FileOverflowPolicy> for OverflowPolicy {
    fn from(value: FileOverflowPolicy) -> Self {
        match value {
            FileOverflowPolicy::Disconnect => OverflowPolicy::Disconnect,
            FileOverflowPolicy::DropOldest => OverflowPolicy::DropOldest,
        }
    }
}

/// Raw gateway configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatewayConfig {
    /// Address the gateway's transports bind to
    pub bind_address: String,
    /// Port the HTTP/WebSocket transport listens on
    pub port: u16,
    /// Bearer token required on `connect`, if any. `None` means `AuthMode::None`.
    pub auth_token: Option<String>,
    /// Per-client event buffer capacity before the overflow policy kicks in
    pub client_buffer_max: usize,
    pub overflow_policy: FileOverflowPolicy,
}

impl Default for FileGatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8787,
            auth_token: None,
            client_buffer_max: 256,
            overflow_policy: FileOverflowPolicy::DropOldest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_overflow_policy_from_snake_case() {
        let toml_str = r#"
[gateway]
overflow_policy = "disconnect"
"#;
        let config: crate::config::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.overflow_policy, FileOverflowPolicy::Disconnect);
    }
}
