//! The public event type a session emits onto its [`super::EventBuffer`].

use crate::adapter::{StopReason, Usage};
use crate::message::ContentBlock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ExecutionStart,
    TickStart { tick: u64 },
    ContentDelta { id: String, delta: String },
    ContentBlockStart { id: String, block_type: String },
    ContentBlockEnd { id: String },
    ToolCallStart { call_id: String, name: String },
    ToolCall { call_id: String, name: String, input: serde_json::Value, summary: Option<String> },
    ToolResult { call_id: String, name: String, result: Vec<ContentBlock>, is_error: bool },
    ToolConfirmationRequest {
        tool_use_id: String,
        name: String,
        arguments: serde_json::Value,
        message: Option<String>,
        metadata: Option<serde_json::Value>,
    },
    TickEnd { usage: Usage },
    ExecutionEnd { stop_reason: StopReason, new_timeline_entries: usize },
    SpawnStart,
    SpawnEnd,
    Error { message: String },
}

impl StreamEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEvent::ExecutionStart => "execution_start",
            StreamEvent::TickStart { .. } => "tick_start",
            StreamEvent::ContentDelta { .. } => "content_delta",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockEnd { .. } => "content_block_end",
            StreamEvent::ToolCallStart { .. } => "tool_call_start",
            StreamEvent::ToolCall { .. } => "tool_call",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::ToolConfirmationRequest { .. } => "tool_confirmation_request",
            StreamEvent::TickEnd { .. } => "tick_end",
            StreamEvent::ExecutionEnd { .. } => "execution_end",
            StreamEvent::SpawnStart => "spawn_start",
            StreamEvent::SpawnEnd => "spawn_end",
            StreamEvent::Error { .. } => "error",
        }
    }
}
