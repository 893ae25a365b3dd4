//! The tool execution port: generalizes a single fixed-risk tool executor
//! contract into a confirmation-aware, session-scoped execution contract.

use async_trait::async_trait;
use relaykit_domain::{ToolCall, ToolResult, ToolSpec};
use tokio_util::sync::CancellationToken;

/// Context passed to a tool invocation: identifies the session/tick and
/// carries the cancellation signal the session engine uses on `abort()`.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub tick: u64,
    pub cancel: CancellationToken,
}

/// Executes resolved tool calls against whatever backs them (filesystem,
/// subprocess, HTTP, a sibling session). Implementations live in
/// infrastructure; this port only fixes the shape the session engine drives.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    fn tool_spec(&self) -> &ToolSpec;

    fn has_tool(&self, name: &str) -> bool {
        self.tool_spec().get_resolved(name).is_some()
    }

    /// Run one call. Never returns `Err` for a tool-level failure — that is
    /// reported as `ToolResult{is_error: true}`; this only errors when the
    /// call cannot be dispatched at all (unknown tool name).
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult;
}
