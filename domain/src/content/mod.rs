//! Outbound content filtering policy.
//!
//! [`ContentPolicy`] decides what an assistant message looks like once it
//! leaves the session and heads toward an external connector. User messages
//! are never run through a policy (they are never echoed back to the sender).

use crate::message::{ContentBlock, Message};
use std::sync::Arc;

/// Produces a human-readable one-line summary of a tool call, used by
/// [`ContentPolicy::Summarized`]. Infrastructure provides the built-in table
/// (file read/write/edit, shell, search) plus any per-tool overrides.
pub trait ToolSummarizer: Send + Sync {
    fn summarize(&self, tool_name: &str, input: &serde_json::Value) -> String;
}

#[derive(Clone)]
pub enum ContentPolicy {
    /// Identity: deliver the message unchanged.
    Full,
    /// Strip `tool_use`/`tool_result` blocks; keep text and media. Messages
    /// that become empty as a result are dropped.
    TextOnly,
    /// Collapse each `tool_use` into one text block via `summarizer`; drop
    /// `tool_result` blocks entirely.
    Summarized(Arc<dyn ToolSummarizer>),
    /// Arbitrary caller-supplied filter.
    Custom(Arc<dyn Fn(&Message) -> Option<Message> + Send + Sync>),
}

impl std::fmt::Debug for ContentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContentPolicy::Full => "Full",
            ContentPolicy::TextOnly => "TextOnly",
            ContentPolicy::Summarized(_) => "Summarized",
            ContentPolicy::Custom(_) => "Custom",
        };
        write!(f, "ContentPolicy::{name}")
    }
}

impl ContentPolicy {
    /// Apply the policy to one message. `None` means the message is dropped
    /// entirely (e.g. it had nothing left after filtering).
    pub fn apply(&self, message: &Message) -> Option<Message> {
        match self {
            ContentPolicy::Full => Some(message.clone()),
            ContentPolicy::TextOnly => {
                let content: Vec<ContentBlock> = message
                    .content
                    .iter()
                    .filter(|b| !matches!(b, ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. }))
                    .cloned()
                    .collect();
                if content.is_empty() {
                    None
                } else {
                    let mut out = message.clone();
                    out.content = content;
                    Some(out)
                }
            }
            ContentPolicy::Summarized(summarizer) => {
                let content: Vec<ContentBlock> = message
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult { .. } => None,
                        ContentBlock::ToolUse { name, input, .. } => {
                            Some(ContentBlock::text(summarizer.summarize(name, input)))
                        }
                        other => Some(other.clone()),
                    })
                    .collect();
                if content.is_empty() {
                    None
                } else {
                    let mut out = message.clone();
                    out.content = content;
                    Some(out)
                }
            }
            ContentPolicy::Custom(f) => f(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn sample() -> Message {
        Message::assistant(vec![
            ContentBlock::text("Reading the file."),
            ContentBlock::tool_use("t1", "read_file", serde_json::json!({"path": "/a.txt"})),
            ContentBlock::tool_result("t1", "read_file", vec![ContentBlock::text("contents")], false),
        ])
    }

    #[test]
    fn full_policy_is_identity() {
        let msg = sample();
        let out = ContentPolicy::Full.apply(&msg).unwrap();
        assert_eq!(out.content.len(), msg.content.len());
    }

    #[test]
    fn text_only_strips_tool_blocks() {
        let out = ContentPolicy::TextOnly.apply(&sample()).unwrap();
        assert_eq!(out.content.len(), 1);
        assert_eq!(out.content[0].as_text(), Some("Reading the file."));
    }

    #[test]
    fn text_only_drops_message_that_becomes_empty() {
        let msg = Message::assistant(vec![ContentBlock::tool_use("t1", "x", serde_json::json!({}))]);
        assert!(ContentPolicy::TextOnly.apply(&msg).is_none());
    }

    struct FixedSummarizer;
    impl ToolSummarizer for FixedSummarizer {
        fn summarize(&self, tool_name: &str, _input: &serde_json::Value) -> String {
            format!("ran {tool_name}")
        }
    }

    #[test]
    fn summarized_collapses_tool_use_and_drops_tool_result() {
        let policy = ContentPolicy::Summarized(Arc::new(FixedSummarizer));
        let out = policy.apply(&sample()).unwrap();
        assert_eq!(out.content.len(), 2);
        assert_eq!(out.content[1].as_text(), Some("ran read_file"));
    }

    #[test]
    fn custom_policy_delegates_to_closure() {
        let policy = ContentPolicy::Custom(Arc::new(|m: &Message| {
            if m.role == Role::Assistant { Some(m.clone()) } else { None }
        }));
        assert!(policy.apply(&sample()).is_some());
        assert!(policy.apply(&Message::user("hi")).is_none());
    }
}
