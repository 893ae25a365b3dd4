//! The canonical message and content-block model shared by every adapter, tool
//! and transport.
//!
//! A session's timeline is a sequence of [`Message`]s; a message's content is an
//! ordered list of [`ContentBlock`]s. This is the provider-independent shape that
//! [`crate::adapter::AdapterAccumulator`] folds a streamed response into, and that
//! the content pipeline filters before delivery.

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Event,
    Ephemeral,
}

/// Where a piece of media content comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    Base64 { media_type: String, data: String },
    Url { media_type: Option<String>, url: String },
    S3 { bucket: String, key: String },
    Gcs { bucket: String, object: String },
    FileId { file_id: String },
}

/// A single piece of content within a [`Message`].
///
/// Tagged union mirroring the wire shape providers increasingly converge on
/// (Anthropic/OpenAI content-block arrays): text, reasoning, media, code, raw
/// JSON, and the two tool-call bookends (`tool_use` / `tool_result`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    /// Model reasoning. `redacted` providers may withhold the text even though
    /// the block is present (kept as an empty string with `redacted: true`).
    Reasoning { text: String, redacted: bool },
    Image { source: MediaSource },
    Document { source: MediaSource, name: Option<String> },
    Audio { source: MediaSource },
    Video { source: MediaSource },
    Code { language: String, code: String },
    Json { data: serde_json::Value },
    ToolUse {
        tool_use_id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        name: String,
        content: Vec<ContentBlock>,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(tool_use_id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse {
            tool_use_id: tool_use_id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        name: impl Into<String>,
        content: Vec<ContentBlock>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            name: name.into(),
            content,
            is_error,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { tool_use_id, .. } | ContentBlock::ToolResult { tool_use_id, .. } => {
                Some(tool_use_id)
            }
            _ => None,
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, ContentBlock::Text { text } if text.is_empty())
    }
}

/// A message in a session's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { id: None, role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn tool_result(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Concatenate every text block, in order.
    pub fn text_content(&self) -> String {
        self.content.iter().filter_map(|b| b.as_text()).collect::<Vec<_>>().join("")
    }

    /// All `tool_use` blocks, in first-seen order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { tool_use_id, name, input } => Some((tool_use_id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Validates the invariant that every `tool_use_id` referenced by a
    /// `tool_result` block appears among `known_ids`.
    pub fn validate_tool_results(&self, known_ids: &std::collections::HashSet<String>) -> Result<(), String> {
        if self.role != Role::Tool {
            return Ok(());
        }
        for block in &self.content {
            match block {
                ContentBlock::ToolResult { tool_use_id, .. } => {
                    if !known_ids.contains(tool_use_id) {
                        return Err(format!("tool_result references unknown tool_use_id {tool_use_id}"));
                    }
                }
                _ => return Err("role=tool messages may only contain tool_result blocks".into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn text_content_concatenates_in_order() {
        let msg = Message::assistant(vec![
            ContentBlock::text("Hello, "),
            ContentBlock::Reasoning { text: "thinking".into(), redacted: false },
            ContentBlock::text("world"),
        ]);
        assert_eq!(msg.text_content(), "Hello, world");
    }

    #[test]
    fn tool_uses_preserve_first_seen_order() {
        let msg = Message::assistant(vec![
            ContentBlock::tool_use("t1", "calc", serde_json::json!({"expr": "2+2"})),
            ContentBlock::tool_use("t2", "lookup", serde_json::json!({})),
        ]);
        let ids: Vec<&str> = msg.tool_uses().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn tool_result_must_reference_known_id() {
        let known: HashSet<String> = ["t1".to_string()].into_iter().collect();
        let ok = Message::tool_result(vec![ContentBlock::tool_result("t1", "calc", vec![ContentBlock::text("4")], false)]);
        assert!(ok.validate_tool_results(&known).is_ok());

        let bad = Message::tool_result(vec![ContentBlock::tool_result("unknown", "calc", vec![], false)]);
        assert!(bad.validate_tool_results(&known).is_err());
    }

    #[test]
    fn tool_role_rejects_non_tool_result_blocks() {
        let known = HashSet::new();
        let bad = Message::new(Role::Tool, vec![ContentBlock::text("oops")]);
        assert!(bad.validate_tool_results(&known).is_err());
    }
}
