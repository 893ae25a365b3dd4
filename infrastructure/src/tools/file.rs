//! File tools: read_file, write_file.

use relaykit_domain::{ToolCall, ToolDefinition, ToolError, ToolResult};
use std::fs;
use std::path::Path;

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";

const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        READ_FILE,
        "Read the contents of a file at the specified path",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to read"},
                "offset": {"type": "number", "description": "Line number to start reading from (0-indexed)"},
                "limit": {"type": "number", "description": "Maximum number of lines to read"},
            },
            "required": ["path"],
        }),
    )
}

pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        WRITE_FILE,
        "Write content to a file at the specified path, creating it if needed",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to write"},
                "content": {"type": "string", "description": "Content to write to the file"},
                "create_dirs": {"type": "boolean", "description": "Create parent directories if missing"},
            },
            "required": ["path", "content"],
        }),
    )
    .requiring_confirmation()
}

pub fn execute_read_file(call: &ToolCall) -> ToolResult {
    let path_str = match call.require_str("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(&call.tool_use_id, READ_FILE, ToolError::invalid_argument(e)),
    };
    let path = Path::new(path_str);

    if !path.exists() {
        return ToolResult::failure(&call.tool_use_id, READ_FILE, ToolError::not_found(path_str));
    }
    if !path.is_file() {
        return ToolResult::failure(
            &call.tool_use_id,
            READ_FILE,
            ToolError::invalid_argument(format!("'{path_str}' is not a file")),
        );
    }

    match fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_READ_SIZE => {
            return ToolResult::failure(
                &call.tool_use_id,
                READ_FILE,
                ToolError::invalid_argument(format!("file too large ({} bytes, max {MAX_READ_SIZE})", meta.len())),
            );
        }
        Err(e) => {
            return ToolResult::failure(&call.tool_use_id, READ_FILE, ToolError::execution_failed(e.to_string()));
        }
        _ => {}
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return ToolResult::failure(&call.tool_use_id, READ_FILE, ToolError::execution_failed(e.to_string())),
    };

    let offset = call.input.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
    let limit = call.input.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);

    let output = if offset > 0 || limit.is_some() {
        let lines: Vec<&str> = content.lines().collect();
        if offset >= lines.len() {
            String::new()
        } else {
            let end = limit.map(|l| (offset + l).min(lines.len())).unwrap_or(lines.len());
            lines[offset..end].join("\n")
        }
    } else {
        content
    };

    ToolResult::text_success(&call.tool_use_id, READ_FILE, output)
}

pub fn execute_write_file(call: &ToolCall) -> ToolResult {
    let path_str = match call.require_str("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(&call.tool_use_id, WRITE_FILE, ToolError::invalid_argument(e)),
    };
    let content = match call.require_str("content") {
        Ok(c) => c,
        Err(e) => return ToolResult::failure(&call.tool_use_id, WRITE_FILE, ToolError::invalid_argument(e)),
    };
    let path = Path::new(path_str);
    let create_dirs = call.input.get("create_dirs").and_then(|v| v.as_bool()).unwrap_or(false);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if create_dirs {
                if let Err(e) = fs::create_dir_all(parent) {
                    return ToolResult::failure(
                        &call.tool_use_id,
                        WRITE_FILE,
                        ToolError::execution_failed(format!("failed to create parent directories: {e}")),
                    );
                }
            } else {
                return ToolResult::failure(
                    &call.tool_use_id,
                    WRITE_FILE,
                    ToolError::not_found(format!("parent directory does not exist: {}", parent.display())),
                );
            }
        }
    }

    let bytes = content.len();
    if let Err(e) = fs::write(path, content) {
        return ToolResult::failure(&call.tool_use_id, WRITE_FILE, ToolError::execution_failed(e.to_string()));
    }

    ToolResult::text_success(&call.tool_use_id, WRITE_FILE, format!("wrote {bytes} bytes to {path_str}"))
}
