//! App/session configuration from TOML (`[app]` section)

use relaykit_application::ConfirmationPolicy;
use serde::{Deserialize, Serialize};

/// Raw app configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAppConfig {
    /// Id of the app used when a session key carries no `app:` prefix
    pub default_app: String,
    /// What the engine does with a confirmable tool call when no client is
    /// attached to answer it
    pub confirmation_policy: ConfirmationPolicy,
}

impl Default for FileAppConfig {
    fn default() -> Self {
        Self { default_app: "default".to_string(), confirmation_policy: ConfirmationPolicy::Interactive }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_confirmation_policy() {
        let toml_str = r#"
[app]
confirmation_policy = "auto_approve"
"#;
        let config: crate::config::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app.confirmation_policy, ConfirmationPolicy::AutoApprove);
    }
}
