//! Tool provider abstraction.
//!
//! A [`ToolProvider`] is a source of tools that can be plugged into a registry:
//! the reference [`crate::adapter::echo`]-style built-ins, a provider backed by
//! an MCP server, a provider wrapping CLI binaries, etc. When more than one
//! provider offers the same tool name, the registry prefers the higher-priority
//! provider.

use async_trait::async_trait;
use thiserror::Error;

use super::entities::{ToolCall, ToolDefinition};
use super::value_objects::ToolResult;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not available: {0}")]
    NotAvailable(String),

    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Unique identifier for this provider, e.g. "builtin", "mcp:filesystem".
    fn id(&self) -> &str;

    /// Priority for tool resolution; higher wins when names collide.
    fn priority(&self) -> i32 {
        0
    }

    async fn is_available(&self) -> bool;

    async fn discover_tools(&self) -> Result<Vec<ToolDefinition>, ProviderError>;

    async fn execute(&self, call: &ToolCall) -> ToolResult;

    async fn has_tool(&self, tool_name: &str) -> bool {
        match self.discover_tools().await {
            Ok(tools) => tools.iter().any(|t| t.name == tool_name),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider {
        id: String,
        tools: Vec<ToolDefinition>,
        available: bool,
    }

    impl MockProvider {
        fn new(id: &str, available: bool) -> Self {
            Self { id: id.to_string(), tools: Vec::new(), available }
        }

        fn with_tool(mut self, name: &str) -> Self {
            self.tools.push(ToolDefinition::new(name, format!("mock tool {name}"), serde_json::json!({"type": "object"})));
            self
        }
    }

    #[async_trait]
    impl ToolProvider for MockProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn discover_tools(&self) -> Result<Vec<ToolDefinition>, ProviderError> {
            if self.available {
                Ok(self.tools.clone())
            } else {
                Err(ProviderError::NotAvailable("mock unavailable".into()))
            }
        }

        async fn execute(&self, call: &ToolCall) -> ToolResult {
            if self.tools.iter().any(|t| t.name == call.tool_name) {
                ToolResult::text_success(&call.tool_use_id, &call.tool_name, "mock output")
            } else {
                ToolResult::failure(&call.tool_use_id, &call.tool_name, super::super::value_objects::ToolError::not_found(&call.tool_name))
            }
        }
    }

    #[tokio::test]
    async fn discovers_tools_when_available() {
        let provider = MockProvider::new("mock", true).with_tool("a").with_tool("b");
        assert!(provider.is_available().await);
        assert_eq!(provider.discover_tools().await.unwrap().len(), 2);
        assert!(provider.has_tool("a").await);
        assert!(!provider.has_tool("unknown").await);
    }

    #[tokio::test]
    async fn discovery_fails_when_unavailable() {
        let provider = MockProvider::new("mock", false);
        assert!(provider.discover_tools().await.is_err());
    }
}
