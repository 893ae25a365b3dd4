//! The provider-independent adapter protocol.
//!
//! [`AdapterDelta`] is the streaming chunk contract every model adapter maps its
//! provider's wire format onto; [`AdapterAccumulator`] folds a sequence of deltas
//! back into one canonical [`crate::message::Message`], mirroring what the
//! non-streaming path would have produced directly.

use crate::message::{ContentBlock, Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Unspecified,
    Stop,
    MaxTokens,
    ToolUse,
    ContentFilter,
    Error,
    Other,
}

/// Token accounting for one tick. Providers report partial-then-final usage;
/// the accumulator merges successive reports by taking the max of each field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn merge_by_max(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
        self.total_tokens = self.total_tokens.max(other.total_tokens);
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter '{adapter}' error: {message}")]
    Provider { adapter: String, message: String },
}

/// A single chunk of a streamed model response, normalized across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterDelta {
    MessageStart,
    Text { delta: String },
    Reasoning { delta: String },
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, delta: String },
    ToolCallEnd { id: String, input: Option<serde_json::Value> },
    ToolCall { id: String, name: String, input: serde_json::Value },
    Usage { usage: Usage },
    MessageEnd { stop_reason: StopReason, usage: Option<Usage> },
    Error { message: String },
    Raw { data: serde_json::Value },
}

#[derive(Debug, Clone)]
struct ToolCallBuffer {
    name: String,
    arg_buf: String,
    input: Option<serde_json::Value>,
}

/// Folds an [`AdapterDelta`] stream into one canonical assistant message.
#[derive(Debug, Clone, Default)]
pub struct AdapterAccumulator {
    text: String,
    reasoning: String,
    reasoning_redacted: bool,
    tool_calls: Vec<String>,
    tool_buffers: HashMap<String, ToolCallBuffer>,
    usage: Usage,
    stop_reason: StopReason,
    model: Option<String>,
    error: Option<String>,
}

impl AdapterAccumulator {
    pub fn new() -> Self {
        Self { stop_reason: StopReason::Unspecified, ..Default::default() }
    }

    /// Fold one delta into the accumulator's state.
    pub fn push(&mut self, delta: AdapterDelta) {
        match delta {
            AdapterDelta::MessageStart => {}
            AdapterDelta::Text { delta } => self.text.push_str(&delta),
            AdapterDelta::Reasoning { delta } => self.reasoning.push_str(&delta),
            AdapterDelta::ToolCallStart { id, name } => {
                self.tool_calls.push(id.clone());
                self.tool_buffers.insert(id, ToolCallBuffer { name, arg_buf: String::new(), input: None });
            }
            AdapterDelta::ToolCallDelta { id, delta } => {
                if let Some(buf) = self.tool_buffers.get_mut(&id) {
                    buf.arg_buf.push_str(&delta);
                }
            }
            AdapterDelta::ToolCallEnd { id, input } => {
                if let Some(buf) = self.tool_buffers.get_mut(&id) {
                    buf.input = Some(input.unwrap_or_else(|| Self::parse_args(&buf.arg_buf)));
                }
            }
            AdapterDelta::ToolCall { id, name, input } => {
                if !self.tool_buffers.contains_key(&id) {
                    self.tool_calls.push(id.clone());
                }
                self.tool_buffers.insert(id, ToolCallBuffer { name, arg_buf: String::new(), input: Some(input) });
            }
            AdapterDelta::Usage { usage } => self.usage.merge_by_max(&usage),
            AdapterDelta::MessageEnd { stop_reason, usage } => {
                self.stop_reason = stop_reason;
                if let Some(u) = usage {
                    self.usage.merge_by_max(&u);
                }
            }
            AdapterDelta::Error { message } => {
                self.error = Some(message);
                self.stop_reason = StopReason::Error;
            }
            AdapterDelta::Raw { .. } => {}
        }
    }

    /// Parse accumulated argument text as JSON; fall back to the raw string on
    /// failure rather than losing the model's output.
    fn parse_args(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Build the canonical assistant message: text, then reasoning (if
    /// unredacted), then one `tool_use` block per call in first-seen order.
    pub fn build(&self) -> Message {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::text(self.text.clone()));
        }
        if !self.reasoning.is_empty() && !self.reasoning_redacted {
            content.push(ContentBlock::Reasoning { text: self.reasoning.clone(), redacted: false });
        }
        for id in &self.tool_calls {
            if let Some(buf) = self.tool_buffers.get(id) {
                let input = buf.input.clone().unwrap_or_else(|| Self::parse_args(&buf.arg_buf));
                content.push(ContentBlock::tool_use(id.clone(), buf.name.clone(), input));
            }
        }
        Message::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_text_then_tool_call_in_order() {
        let mut acc = AdapterAccumulator::new();
        acc.push(AdapterDelta::Text { delta: "2".into() });
        acc.push(AdapterDelta::Text { delta: "+2=".into() });
        acc.push(AdapterDelta::ToolCallStart { id: "t1".into(), name: "calc".into() });
        acc.push(AdapterDelta::ToolCallDelta { id: "t1".into(), delta: "{\"expr\":".into() });
        acc.push(AdapterDelta::ToolCallDelta { id: "t1".into(), delta: "\"2+2\"}".into() });
        acc.push(AdapterDelta::ToolCallEnd { id: "t1".into(), input: None });
        acc.push(AdapterDelta::MessageEnd { stop_reason: StopReason::ToolUse, usage: None });

        assert_eq!(acc.stop_reason(), StopReason::ToolUse);
        let msg = acc.build();
        assert_eq!(msg.text_content(), "2+2=");
        let tool_uses: Vec<_> = msg.tool_uses().collect();
        assert_eq!(tool_uses.len(), 1);
        assert_eq!(tool_uses[0].1, "calc");
        assert_eq!(tool_uses[0].2, &serde_json::json!({"expr": "2+2"}));
    }

    #[test]
    fn malformed_tool_args_fall_back_to_raw_string() {
        let mut acc = AdapterAccumulator::new();
        acc.push(AdapterDelta::ToolCallStart { id: "t1".into(), name: "calc".into() });
        acc.push(AdapterDelta::ToolCallDelta { id: "t1".into(), delta: "not json".into() });
        acc.push(AdapterDelta::ToolCallEnd { id: "t1".into(), input: None });

        let msg = acc.build();
        let (_, _, input) = msg.tool_uses().next().unwrap();
        assert_eq!(input, &serde_json::Value::String("not json".into()));
    }

    #[test]
    fn usage_merges_by_max_across_chunks() {
        let mut acc = AdapterAccumulator::new();
        acc.push(AdapterDelta::Usage { usage: Usage { input_tokens: 10, output_tokens: 1, total_tokens: 11 } });
        acc.push(AdapterDelta::Usage { usage: Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15 } });
        acc.push(AdapterDelta::MessageEnd {
            stop_reason: StopReason::Stop,
            usage: Some(Usage { input_tokens: 8, output_tokens: 20, total_tokens: 28 }),
        });
        let usage = acc.usage();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 20);
        assert_eq!(usage.total_tokens, 28);
    }

    #[test]
    fn complete_tool_call_replaces_partial_entry() {
        let mut acc = AdapterAccumulator::new();
        acc.push(AdapterDelta::ToolCallStart { id: "t1".into(), name: "calc".into() });
        acc.push(AdapterDelta::ToolCallDelta { id: "t1".into(), delta: "partial".into() });
        acc.push(AdapterDelta::ToolCall { id: "t1".into(), name: "calc".into(), input: serde_json::json!({"expr": "1+1"}) });

        let msg = acc.build();
        let (_, _, input) = msg.tool_uses().next().unwrap();
        assert_eq!(input, &serde_json::json!({"expr": "1+1"}));
    }

    #[test]
    fn error_delta_sets_stop_reason_and_message() {
        let mut acc = AdapterAccumulator::new();
        acc.push(AdapterDelta::Text { delta: "partial".into() });
        acc.push(AdapterDelta::Error { message: "rate limited".into() });
        assert_eq!(acc.stop_reason(), StopReason::Error);
        assert_eq!(acc.error(), Some("rate limited"));
    }
}
