//! Search tools: glob_search, grep_search.

use glob::glob;
use regex::Regex;
use relaykit_domain::{ToolCall, ToolDefinition, ToolError, ToolResult};
use std::fs;
use std::path::{Path, PathBuf};

pub const GLOB_SEARCH: &str = "glob_search";
pub const GREP_SEARCH: &str = "grep_search";

const MAX_RESULTS: usize = 1000;
const MAX_GREP_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub fn glob_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        GLOB_SEARCH,
        "Search for files matching a glob pattern (e.g. '**/*.rs')",
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "base_dir": {"type": "string"},
                "max_results": {"type": "number"},
            },
            "required": ["pattern"],
        }),
    )
}

pub fn grep_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        GREP_SEARCH,
        "Search file contents for a regex pattern",
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "file_pattern": {"type": "string"},
                "context_lines": {"type": "number"},
                "case_insensitive": {"type": "boolean"},
            },
            "required": ["pattern", "path"],
        }),
    )
}

pub fn execute_glob_search(call: &ToolCall) -> ToolResult {
    let pattern = match call.require_str("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(&call.tool_use_id, GLOB_SEARCH, ToolError::invalid_argument(e)),
    };
    let base_dir = call.get_str("base_dir").unwrap_or(".");
    let max_results = call
        .input
        .get("max_results")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(MAX_RESULTS)
        .min(MAX_RESULTS);

    let full_pattern = if pattern.starts_with('/') || pattern.starts_with("./") {
        pattern.to_string()
    } else {
        format!("{base_dir}/{pattern}")
    };

    let entries = match glob(&full_pattern) {
        Ok(paths) => paths,
        Err(e) => {
            return ToolResult::failure(
                &call.tool_use_id,
                GLOB_SEARCH,
                ToolError::invalid_argument(format!("invalid glob pattern: {e}")),
            );
        }
    };

    let mut results = Vec::new();
    for entry in entries {
        if results.len() >= max_results {
            break;
        }
        if let Ok(path) = entry {
            results.push(path.display().to_string());
        }
    }

    let output = if results.is_empty() {
        "no files found matching the pattern".to_string()
    } else {
        results.join("\n")
    };
    ToolResult::text_success(&call.tool_use_id, GLOB_SEARCH, output)
}

pub fn execute_grep_search(call: &ToolCall) -> ToolResult {
    let pattern_str = match call.require_str("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(&call.tool_use_id, GREP_SEARCH, ToolError::invalid_argument(e)),
    };
    let path_str = match call.require_str("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(&call.tool_use_id, GREP_SEARCH, ToolError::invalid_argument(e)),
    };
    let path = Path::new(path_str);
    if !path.exists() {
        return ToolResult::failure(&call.tool_use_id, GREP_SEARCH, ToolError::not_found(path_str));
    }

    let file_pattern = call.get_str("file_pattern");
    let context_lines = call.input.get("context_lines").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
    let case_insensitive = call.input.get("case_insensitive").and_then(|v| v.as_bool()).unwrap_or(false);

    let regex_pattern = if case_insensitive { format!("(?i){pattern_str}") } else { pattern_str.to_string() };
    let regex = match Regex::new(&regex_pattern) {
        Ok(r) => r,
        Err(e) => {
            return ToolResult::failure(
                &call.tool_use_id,
                GREP_SEARCH,
                ToolError::invalid_argument(format!("invalid regex: {e}")),
            );
        }
    };

    let files = if path.is_file() { vec![path.to_path_buf()] } else { collect_files(path, file_pattern) };

    let mut results = Vec::new();
    for file_path in files {
        if results.len() >= MAX_RESULTS {
            break;
        }
        if let Ok(meta) = fs::metadata(&file_path) {
            if meta.len() > MAX_GREP_FILE_SIZE {
                continue;
            }
        }
        let Ok(content) = fs::read_to_string(&file_path) else { continue };
        let lines: Vec<&str> = content.lines().collect();
        let display = file_path.display().to_string();

        for (line_num, line) in lines.iter().enumerate() {
            if results.len() >= MAX_RESULTS {
                break;
            }
            if !regex.is_match(line) {
                continue;
            }
            if context_lines > 0 {
                let start = line_num.saturating_sub(context_lines);
                let end = (line_num + context_lines + 1).min(lines.len());
                let mut entry = format!("{display}:");
                for (i, ctx_line) in lines[start..end].iter().enumerate() {
                    let marker = if start + i == line_num { ">" } else { " " };
                    entry.push_str(&format!("\n{marker}{}: {ctx_line}", start + i + 1));
                }
                results.push(entry);
            } else {
                results.push(format!("{display}:{}: {line}", line_num + 1));
            }
        }
    }

    let output = if results.is_empty() { "no matches found".to_string() } else { results.join("\n") };
    ToolResult::text_success(&call.tool_use_id, GREP_SEARCH, output)
}

fn collect_files(dir: &Path, file_pattern: Option<&str>) -> Vec<PathBuf> {
    let pattern = file_pattern.unwrap_or("**/*");
    let full_pattern = format!("{}/{pattern}", dir.display());
    glob(&full_pattern)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|p| p.is_file())
        .take(MAX_RESULTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn glob_search_finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let call = ToolCall::new(
            "t1",
            GLOB_SEARCH,
            serde_json::json!({"pattern": "*.txt", "base_dir": dir.path().to_str().unwrap()}),
        );
        let result = execute_glob_search(&call);
        assert!(!result.is_error);
        assert!(result.content[0].as_text().unwrap().contains("a.txt"));
    }

    #[test]
    fn grep_search_finds_matching_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two with needle").unwrap();
        let call = ToolCall::new(
            "t1",
            GREP_SEARCH,
            serde_json::json!({"pattern": "needle", "path": file.path().to_str().unwrap()}),
        );
        let result = execute_grep_search(&call);
        assert!(!result.is_error);
        assert!(result.content[0].as_text().unwrap().contains(":2:"));
    }

    #[test]
    fn grep_search_invalid_regex_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let call = ToolCall::new(
            "t1",
            GREP_SEARCH,
            serde_json::json!({"pattern": "[invalid", "path": file.path().to_str().unwrap()}),
        );
        assert!(execute_grep_search(&call).is_error);
    }
}
