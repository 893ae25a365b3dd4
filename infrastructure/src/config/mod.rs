//! Configuration file loading for relaykit
//!
//! This module handles file I/O and merging of configuration from multiple
//! sources. The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./relaykit.toml` or `./.relaykit.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/relaykit/config.toml`
//! 4. Fallback: `~/.config/relaykit/config.toml`
//! 5. Default values

mod loader;
mod sections;

pub use loader::ConfigLoader;
pub use sections::app::FileAppConfig;
pub use sections::gateway::{FileGatewayConfig, FileOverflowPolicy};
pub use sections::guardrail::{FileGuardrailConfig, FileGuardrailRule};
pub use sections::model::FileModelConfig;
pub use sections::rate_limit::FileRateLimitConfig;
pub use sections::transport::FileTransportConfig;

use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gateway: FileGatewayConfig,
    pub app: FileAppConfig,
    pub transport: FileTransportConfig,
    pub rate_limit: FileRateLimitConfig,
    pub guardrail: FileGuardrailConfig,
    pub model: FileModelConfig,
}
