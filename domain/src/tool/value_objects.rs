//! Tool result value objects.

use crate::message::ContentBlock;
use serde::{Deserialize, Serialize};

/// An error surfaced from a tool invocation.
///
/// Distinct from [`crate::guard::GuardError`]: this is what a *tool* reports about
/// its own execution, not what a middleware decided before the tool even ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", format!("resource not found: {}", resource.into()))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::new("REJECTED", format!("rejected: {}", reason.into()))
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

/// The result of running a tool, ready to fold into a `tool_result` content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub tool_name: String,
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, tool_name: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self { tool_use_id: tool_use_id.into(), tool_name: tool_name.into(), content, is_error: false }
    }

    pub fn text_success(tool_use_id: impl Into<String>, tool_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::success(tool_use_id, tool_name, vec![ContentBlock::text(text)])
    }

    pub fn failure(tool_use_id: impl Into<String>, tool_name: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            content: vec![ContentBlock::text(error.to_string())],
            is_error: true,
        }
    }

    pub fn rejected(tool_use_id: impl Into<String>, tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::failure(tool_use_id, tool_name, ToolError::rejected(reason))
    }

    pub fn into_content_block(self) -> ContentBlock {
        ContentBlock::tool_result(self.tool_use_id, self.tool_name, self.content, self.is_error)
    }
}
