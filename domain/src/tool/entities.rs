//! Tool domain entities.

use crate::message::ContentBlock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Definition of a tool the renderer may offer the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool (e.g. "read_file").
    pub name: String,
    pub description: String,
    /// JSON Schema describing the call's arguments.
    pub input_schema: Value,
    /// JSON Schema describing the tool's output, if it declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Whether a human must approve each call before it runs.
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Whether calls to this tool within one tick must run one at a time.
    #[serde(default)]
    pub sequential: bool,
    /// Opaque provider-specific hints (e.g. OpenAI strict-mode flags).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_options: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
            requires_confirmation: false,
            sequential: false,
            provider_options: None,
        }
    }

    pub fn requiring_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Required argument names, read from `input_schema.required`.
    pub fn required_args(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Declared property names, read from `input_schema.properties`.
    pub fn known_args(&self) -> Vec<String> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Registry of tool definitions, keyed by canonical name, with alias support.
#[derive(Debug, Clone, Default)]
pub struct ToolSpec {
    tools: HashMap<String, ToolDefinition>,
    aliases: HashMap<String, String>,
}

impl ToolSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: ToolDefinition) -> Self {
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    pub fn register_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    pub fn register_aliases(mut self, mappings: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        for (alias, canonical) in mappings {
            self.aliases.insert(alias.into(), canonical.into());
        }
        self
    }

    pub fn resolve_alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|s| s.as_str())
    }

    /// Resolve a name to its canonical form: canonical names win over aliases.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.tools.contains_key(name) {
            Some(name)
        } else {
            self.resolve_alias(name)
        }
    }

    pub fn get_resolved(&self, name: &str) -> Option<&ToolDefinition> {
        self.resolve(name).and_then(|canonical| self.tools.get(canonical))
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|s| s.as_str())
    }

    pub fn confirmable_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values().filter(|t| t.requires_confirmation)
    }
}

/// A model-issued call to a tool, correlated by `tool_use_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_use_id: String,
    pub tool_name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(tool_use_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, String> {
        self.get_str(key).ok_or_else(|| format!("missing required argument: {key}"))
    }

    pub fn as_tool_use_block(&self) -> ContentBlock {
        ContentBlock::tool_use(self.tool_use_id.clone(), self.tool_name.clone(), self.input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"],
        })
    }

    #[test]
    fn required_and_known_args_read_from_schema() {
        let def = ToolDefinition::new("read_file", "Read a file", schema());
        assert_eq!(def.required_args(), vec!["path".to_string()]);
        assert_eq!(def.known_args(), vec!["path".to_string()]);
    }

    #[test]
    fn alias_resolution_prefers_canonical_name() {
        let spec = ToolSpec::new()
            .register(ToolDefinition::new("run_command", "Run a shell command", schema()))
            .register(ToolDefinition::new("view", "View tool", schema()))
            .register_alias("view", "run_command")
            .register_alias("bash", "run_command");

        assert_eq!(spec.resolve("view"), Some("view"));
        assert_eq!(spec.resolve("bash"), Some("run_command"));
        assert_eq!(spec.resolve("unknown"), None);
        assert_eq!(spec.get_resolved("bash").unwrap().name, "run_command");
    }

    #[test]
    fn register_aliases_batch() {
        let spec = ToolSpec::new()
            .register(ToolDefinition::new("grep_search", "Grep", schema()))
            .register_aliases([("grep", "grep_search"), ("rg", "grep_search")]);
        assert_eq!(spec.resolve("grep"), Some("grep_search"));
        assert_eq!(spec.resolve("rg"), Some("grep_search"));
    }

    #[test]
    fn tool_call_arg_accessors() {
        let call = ToolCall::new("t1", "read_file", serde_json::json!({"path": "/a.txt"}));
        assert_eq!(call.get_str("path"), Some("/a.txt"));
        assert!(call.require_str("missing").is_err());
    }
}
