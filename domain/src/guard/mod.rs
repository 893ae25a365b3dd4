//! Guard/guardrail error taxonomy and the tool guardrail's rule table.
//!
//! The middleware chain itself ("wrap this procedure, call `next()` unless
//! denied") lives in the application layer since it wraps async operations;
//! this module holds the pure, synchronous pieces: the error shape a denial
//! produces, and first-match-wins glob rule evaluation for tool calls.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// The `{operationName, args, context, metadata}` envelope a guard middleware
/// sees, passed to a [`ToolGuardrail`]'s classifier fallback alongside the
/// tool name.
#[derive(Debug, Clone, Default)]
pub struct GuardEnvelope {
    pub operation_name: String,
    pub args: serde_json::Value,
    pub context: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl GuardEnvelope {
    pub fn for_tool_call(operation_name: impl Into<String>, args: serde_json::Value) -> Self {
        Self { operation_name: operation_name.into(), args, context: None, metadata: None }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{reason}")]
    Denied { reason: String, guard_type: String },

    #[error("guardrail denied tool '{tool_name}': {reason}")]
    GuardrailDenied { tool_name: String, reason: String },
}

impl GuardError {
    pub fn denied(guard_type: impl Into<String>, reason: impl Into<String>) -> Self {
        GuardError::Denied { reason: reason.into(), guard_type: guard_type.into() }
    }

    pub fn guardrail_denied(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        GuardError::GuardrailDenied { tool_name: tool_name.into(), reason: reason.into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Denied { .. } => "GUARD_DENIED",
            GuardError::GuardrailDenied { .. } => "GUARD_DENIED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// One glob-pattern rule in a [`ToolGuardrail`]'s rule table.
#[derive(Debug, Clone)]
pub struct GuardRule {
    pub patterns: Vec<String>,
    pub action: RuleAction,
    pub reason: Option<String>,
}

impl GuardRule {
    pub fn new(patterns: Vec<String>, action: RuleAction) -> Self {
        Self { patterns, action, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    fn matches(&self, tool_name: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern).map(|p| p.matches(tool_name)).unwrap_or(false)
        })
    }
}

type Classifier = Arc<dyn Fn(&str, &GuardEnvelope) -> Option<(RuleAction, Option<String>)> + Send + Sync>;

/// First-match-wins table of tool-name rules guarding `tool:run`, with an
/// optional classifier fallback for calls no rule covers.
#[derive(Clone, Default)]
pub struct ToolGuardrail {
    rules: Vec<GuardRule>,
    classify: Option<Classifier>,
}

impl std::fmt::Debug for ToolGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGuardrail")
            .field("rules", &self.rules)
            .field("classify", &self.classify.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ToolGuardrail {
    pub fn new(rules: Vec<GuardRule>) -> Self {
        Self { rules, classify: None }
    }

    /// Runs only when no rule in the table matches the call.
    pub fn with_classifier(
        mut self,
        f: impl Fn(&str, &GuardEnvelope) -> Option<(RuleAction, Option<String>)> + Send + Sync + 'static,
    ) -> Self {
        self.classify = Some(Arc::new(f));
        self
    }

    /// The first matching rule's decision; if none matches, the classifier's
    /// decision (if one is configured); otherwise `None` (caller allows).
    pub fn evaluate(&self, tool_name: &str, envelope: &GuardEnvelope) -> Option<(RuleAction, Option<String>)> {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(tool_name)) {
            return Some((rule.action, rule.reason.clone()));
        }
        self.classify.as_ref().and_then(|classify| classify(tool_name, envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(tool_name: &str) -> GuardEnvelope {
        GuardEnvelope::for_tool_call("tool:run", serde_json::json!({"name": tool_name}))
    }

    #[test]
    fn first_matching_rule_wins() {
        let guardrail = ToolGuardrail::new(vec![
            GuardRule::new(vec!["delete_*".into()], RuleAction::Deny).with_reason("destructive"),
            GuardRule::new(vec!["*".into()], RuleAction::Allow),
        ]);

        assert_eq!(guardrail.evaluate("delete_file", &envelope("delete_file")).unwrap().0, RuleAction::Deny);
        assert_eq!(guardrail.evaluate("read_file", &envelope("read_file")).unwrap().0, RuleAction::Allow);
    }

    #[test]
    fn no_match_returns_none_without_a_classifier() {
        let guardrail = ToolGuardrail::new(vec![GuardRule::new(vec!["delete_*".into()], RuleAction::Deny)]);
        assert!(guardrail.evaluate("read_file", &envelope("read_file")).is_none());
    }

    #[test]
    fn classifier_runs_only_when_no_rule_matched() {
        let guardrail = ToolGuardrail::new(vec![GuardRule::new(vec!["delete_*".into()], RuleAction::Deny)])
            .with_classifier(|name, _envelope| {
                if name == "run_command" {
                    Some((RuleAction::Deny, Some("classified as risky".to_string())))
                } else {
                    None
                }
            });

        // A rule matches "delete_file" directly; the classifier must not override it.
        let (action, reason) = guardrail.evaluate("delete_file", &envelope("delete_file")).unwrap();
        assert_eq!(action, RuleAction::Deny);
        assert_ne!(reason.as_deref(), Some("classified as risky"));

        // No rule matches "run_command"; the classifier's decision applies.
        let (action, reason) = guardrail.evaluate("run_command", &envelope("run_command")).unwrap();
        assert_eq!(action, RuleAction::Deny);
        assert_eq!(reason.as_deref(), Some("classified as risky"));

        // No rule and no classifier opinion: falls through to None (caller allows).
        assert!(guardrail.evaluate("read_file", &envelope("read_file")).is_none());
    }

    #[test]
    fn guard_error_code_is_stable() {
        let err = GuardError::guardrail_denied("delete_file", "destructive");
        assert_eq!(err.code(), "GUARD_DENIED");
    }
}
