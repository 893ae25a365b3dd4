//! Built-in tool implementations and the local `ToolRunner` that dispatches to
//! them: dispatch runs on the blocking thread pool and is raced against the
//! call's cancellation token.

pub mod command;
pub mod file;
pub mod registry;
pub mod search;
pub mod summarizer;

use async_trait::async_trait;
use relaykit_application::ports::tool::{ToolContext, ToolRunner};
use relaykit_domain::tool::traits::{DefaultToolValidator, ToolValidator};
use relaykit_domain::{ToolCall, ToolError, ToolResult, ToolSpec};

/// All built-in tools, unrestricted.
pub fn default_tool_spec() -> ToolSpec {
    ToolSpec::new()
        .register(file::read_file_definition())
        .register(file::write_file_definition())
        .register(command::run_command_definition())
        .register(search::glob_search_definition())
        .register(search::grep_search_definition())
}

/// Built-in tools that cannot mutate anything outside the process (no writes,
/// no shell).
pub fn read_only_tool_spec() -> ToolSpec {
    ToolSpec::new()
        .register(file::read_file_definition())
        .register(search::glob_search_definition())
        .register(search::grep_search_definition())
}

/// Runs the built-in tools on the local machine. File and search tools run
/// inline; `run_command` runs on the blocking pool so it cannot stall the
/// engine's async tasks, and is killed if the tool context is cancelled first.
#[derive(Debug, Clone)]
pub struct LocalToolRunner {
    tool_spec: ToolSpec,
    working_dir: Option<String>,
}

impl LocalToolRunner {
    pub fn new() -> Self {
        Self { tool_spec: default_tool_spec(), working_dir: None }
    }

    pub fn read_only() -> Self {
        Self { tool_spec: read_only_tool_spec(), working_dir: None }
    }

    pub fn with_tools(tool_spec: ToolSpec) -> Self {
        Self { tool_spec, working_dir: None }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(canonical) = self.tool_spec.resolve(&call.tool_name) else {
            return ToolResult::failure(
                &call.tool_use_id,
                &call.tool_name,
                ToolError::not_found(format!("unknown tool: {}", call.tool_name)),
            );
        };
        let definition = self.tool_spec.get(canonical).expect("resolved name must be registered");

        let validator = DefaultToolValidator;
        if let Err(e) = validator.validate(call, definition) {
            return ToolResult::failure(&call.tool_use_id, canonical, ToolError::invalid_argument(e));
        }

        match canonical {
            file::READ_FILE => file::execute_read_file(call),
            file::WRITE_FILE => file::execute_write_file(call),
            command::RUN_COMMAND => {
                if self.working_dir.is_some() && call.get_str("working_dir").is_none() {
                    let mut input = call.input.clone();
                    if let (Some(obj), Some(dir)) = (input.as_object_mut(), &self.working_dir) {
                        obj.insert("working_dir".into(), serde_json::Value::String(dir.clone()));
                    }
                    let rewritten = ToolCall::new(call.tool_use_id.clone(), call.tool_name.clone(), input);
                    command::execute_run_command(&rewritten)
                } else {
                    command::execute_run_command(call)
                }
            }
            search::GLOB_SEARCH => search::execute_glob_search(call),
            search::GREP_SEARCH => search::execute_grep_search(call),
            other => ToolResult::failure(
                &call.tool_use_id,
                other,
                ToolError::execution_failed(format!("tool '{other}' has no implementation")),
            ),
        }
    }
}

impl Default for LocalToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRunner for LocalToolRunner {
    fn tool_spec(&self) -> &ToolSpec {
        &self.tool_spec
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let this = self.clone();
        let owned_call = call.clone();
        let join = tokio::task::spawn_blocking(move || this.dispatch(&owned_call));

        tokio::select! {
            result = join => result.unwrap_or_else(|e| {
                ToolResult::failure(&call.tool_use_id, &call.tool_name, ToolError::execution_failed(format!("tool task panicked: {e}")))
            }),
            _ = ctx.cancel.cancelled() => {
                ToolResult::rejected(&call.tool_use_id, &call.tool_name, "cancelled")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolContext {
        ToolContext { session_id: "s1".into(), tick: 0, cancel: CancellationToken::new() }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let runner = LocalToolRunner::new();
        let call = ToolCall::new("t1", "does_not_exist", serde_json::json!({}));
        let result = runner.execute(&call, &ctx()).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn read_only_runner_has_no_write_or_command_tool() {
        let runner = LocalToolRunner::read_only();
        assert!(runner.has_tool("read_file"));
        assert!(!runner.has_tool("write_file"));
        assert!(!runner.has_tool("run_command"));
    }

    #[tokio::test]
    async fn read_file_executes_through_the_runner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hi").unwrap();
        let runner = LocalToolRunner::new();
        let call = ToolCall::new("t1", "read_file", serde_json::json!({"path": path.to_str().unwrap()}));
        let result = runner.execute(&call, &ctx()).await;
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn cancelled_context_rejects_the_call() {
        let runner = LocalToolRunner::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let call = ToolCall::new("t1", "run_command", serde_json::json!({"command": "sleep 5"}));
        let ctx = ToolContext { session_id: "s1".into(), tick: 0, cancel };
        let result = runner.execute(&call, &ctx).await;
        assert!(result.is_error);
    }
}
