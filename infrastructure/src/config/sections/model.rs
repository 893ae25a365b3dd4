//! Model adapter selection from TOML (`[model]` section)

use serde::{Deserialize, Serialize};

/// Raw model configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelConfig {
    /// Adapter id to construct. `"echo"` is the only built-in; anything else
    /// is resolved by the binary crate's adapter registry at startup.
    pub adapter: String,
    pub model: Option<String>,
}

impl Default for FileModelConfig {
    fn default() -> Self {
        Self { adapter: "echo".to_string(), model: None }
    }
}
