//! Built-in `ToolSummarizer` for the canonical file/search/command tools,
//! keyed case-insensitively like `ToolSpec::resolve_alias`, with a fallback
//! for tools it doesn't know.

use relaykit_domain::content::ToolSummarizer;
use serde_json::Value;

#[derive(Debug, Default, Clone)]
pub struct BuiltinToolSummarizer;

fn arg<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

impl ToolSummarizer for BuiltinToolSummarizer {
    fn summarize(&self, tool_name: &str, input: &Value) -> String {
        match tool_name.to_ascii_lowercase().as_str() {
            "read_file" => match arg(input, "path") {
                Some(path) => format!("Read {path}"),
                None => "Read a file".to_string(),
            },
            "write_file" => match arg(input, "path") {
                Some(path) => format!("Wrote {path}"),
                None => "Wrote a file".to_string(),
            },
            "run_command" => match arg(input, "command") {
                Some(cmd) => format!("Ran `{cmd}`"),
                None => "Ran a shell command".to_string(),
            },
            "glob_search" => match arg(input, "pattern") {
                Some(p) => format!("Searched for files matching `{p}`"),
                None => "Searched for files".to_string(),
            },
            "grep_search" => match arg(input, "pattern") {
                Some(p) => format!("Searched file contents for `{p}`"),
                None => "Searched file contents".to_string(),
            },
            _ => format!("Called {tool_name}"),
        }
    }
}
