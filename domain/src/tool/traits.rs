//! Pure, synchronous tool-validation logic.
//!
//! The async `Tool`/execution contract lives in the application layer as a port;
//! this trait only checks a call's shape against its declared schema before the
//! engine bothers invoking anything.

use super::entities::{ToolCall, ToolDefinition};

pub trait ToolValidator {
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String>;
}

/// Validates required/known arguments against a flat JSON-Schema `object` shape.
/// Does not attempt general schema validation (types, enums, nested schemas) -
/// that is delegate work for a real JSON-Schema crate if a tool needs it.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String> {
        let Some(obj) = call.input.as_object() else {
            return Err(format!("arguments for '{}' must be a JSON object", definition.name));
        };

        for required in definition.required_args() {
            if !obj.contains_key(&required) {
                return Err(format!("missing required parameter '{required}' for tool '{}'", definition.name));
            }
        }

        let known = definition.known_args();
        if !known.is_empty() {
            for key in obj.keys() {
                if !known.iter().any(|k| k == key) {
                    return Err(format!("unknown parameter '{key}' for tool '{}'", definition.name));
                }
            }
        }

        Ok(())
    }
}
