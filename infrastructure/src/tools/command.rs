//! Shell command execution tool: run_command.

use relaykit_domain::{ToolCall, ToolDefinition, ToolError, ToolResult};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub const RUN_COMMAND: &str = "run_command";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

pub fn run_command_definition() -> ToolDefinition {
    ToolDefinition::new(
        RUN_COMMAND,
        "Execute a shell command and return its combined stdout/stderr",
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "working_dir": {"type": "string"},
                "timeout_secs": {"type": "number"},
            },
            "required": ["command"],
        }),
    )
    .requiring_confirmation()
    .sequential()
}

/// Blocking; callers run this on a blocking thread pool.
pub fn execute_run_command(call: &ToolCall) -> ToolResult {
    let command_str = match call.require_str("command") {
        Ok(c) => c,
        Err(e) => return ToolResult::failure(&call.tool_use_id, RUN_COMMAND, ToolError::invalid_argument(e)),
    };
    let working_dir = call.get_str("working_dir");
    let timeout_secs = call.input.get("timeout_secs").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_TIMEOUT_SECS);

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command_str]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command_str]);
        c
    };

    if let Some(dir) = working_dir {
        let path = std::path::Path::new(dir);
        if !path.is_dir() {
            return ToolResult::failure(
                &call.tool_use_id,
                RUN_COMMAND,
                ToolError::not_found(format!("working directory does not exist: {dir}")),
            );
        }
        cmd.current_dir(path);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return ToolResult::failure(
                &call.tool_use_id,
                RUN_COMMAND,
                ToolError::execution_failed(format!("failed to spawn command: {e}")),
            );
        }
    };

    let output = match wait_with_timeout(child, Duration::from_secs(timeout_secs)) {
        Ok(o) => o,
        Err(e) => {
            return ToolResult::failure(
                &call.tool_use_id,
                RUN_COMMAND,
                ToolError::new("TIMEOUT", format!("command timed out after {timeout_secs}s: {e}")),
            );
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut combined = String::new();
    if !stdout.is_empty() {
        combined.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push_str("\n--- stderr ---\n");
        }
        combined.push_str(&stderr);
    }
    if combined.len() > MAX_OUTPUT_SIZE {
        combined.truncate(MAX_OUTPUT_SIZE);
        combined.push_str("\n... (output truncated)");
    }

    if output.status.success() {
        ToolResult::text_success(&call.tool_use_id, RUN_COMMAND, combined)
    } else {
        ToolResult::text_success(&call.tool_use_id, RUN_COMMAND, format!("exit code {exit_code}\n{combined}"))
    }
}

fn wait_with_timeout(mut child: std::process::Child, timeout: Duration) -> Result<std::process::Output, String> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = child
                    .stdout
                    .take()
                    .map(|mut s| {
                        let mut buf = Vec::new();
                        std::io::Read::read_to_end(&mut s, &mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(|mut s| {
                        let mut buf = Vec::new();
                        std::io::Read::read_to_end(&mut s, &mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                return Ok(std::process::Output { status, stdout, stderr });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err("command timed out".to_string());
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(format!("failed to wait for process: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_echo_succeeds() {
        let call = ToolCall::new("t1", RUN_COMMAND, serde_json::json!({"command": "echo hello"}));
        let result = execute_run_command(&call);
        assert!(!result.is_error);
        assert!(result.content[0].as_text().unwrap().contains("hello"));
    }

    #[test]
    fn run_command_nonzero_exit_is_still_a_tool_success() {
        let call = ToolCall::new("t1", RUN_COMMAND, serde_json::json!({"command": "exit 1"}));
        let result = execute_run_command(&call);
        assert!(!result.is_error);
        assert!(result.content[0].as_text().unwrap().contains("exit code 1"));
    }

    #[test]
    fn run_command_invalid_working_dir_fails() {
        let call = ToolCall::new(
            "t1",
            RUN_COMMAND,
            serde_json::json!({"command": "echo hi", "working_dir": "/nonexistent/dir"}),
        );
        assert!(execute_run_command(&call).is_error);
    }
}
