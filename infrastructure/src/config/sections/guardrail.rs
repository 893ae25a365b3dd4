//! Tool guardrail rule table from TOML (`[[guardrail.rules]]` entries)

use relaykit_domain::{GuardRule, RuleAction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGuardrailRule {
    /// Glob patterns matched against the tool name, first-match-wins
    pub patterns: Vec<String>,
    pub action: RuleAction,
    pub reason: Option<String>,
}

impl Default for FileGuardrailRule {
    fn default() -> Self {
        Self { patterns: Vec::new(), action: RuleAction::Allow, reason: None }
    }
}

impl From<FileGuardrailRule> for GuardRule {
    fn from(rule: FileGuardrailRule) -> Self {
        let mut out = GuardRule::new(rule.patterns, rule.action);
        if let Some(reason) = rule.reason {
            out = out.with_reason(reason);
        }
        out
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGuardrailConfig {
    pub rules: Vec<FileGuardrailRule>,
}
