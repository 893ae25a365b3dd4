//! Per-connector rate limit configuration from TOML (`[rate_limit]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub enabled: bool,
    pub per_minute: u32,
    pub per_day: u32,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        Self { enabled: false, per_minute: 30, per_day: 2000 }
    }
}
