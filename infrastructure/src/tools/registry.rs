//! Aggregates multiple [`ToolProvider`]s behind one [`ToolRunner`]: providers
//! are sorted by priority (highest first), `discover()` merges their tools
//! into one `ToolSpec` with higher-priority providers winning name
//! collisions, and `execute` routes each call to whichever provider
//! registered that name.
//!
//! `discover()` takes `&mut self` and is meant to run once at startup, before
//! the registry is wrapped in the `Arc<dyn ToolRunner>` the engine holds.

use crate::tools::LocalToolRunner;
use async_trait::async_trait;
use relaykit_application::ports::tool::{ToolContext, ToolRunner};
use relaykit_domain::tool::provider::ProviderError;
use relaykit_domain::{ToolCall, ToolDefinition, ToolError, ToolProvider, ToolResult, ToolSpec};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ToolRegistry {
    providers: Vec<Arc<dyn ToolProvider>>,
    tool_mapping: HashMap<String, String>,
    tool_spec: ToolSpec,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { providers: Vec::new(), tool_mapping: HashMap::new(), tool_spec: ToolSpec::new() }
    }

    pub fn register(mut self, provider: Arc<dyn ToolProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Re-sorts providers by priority and rebuilds the merged `ToolSpec`.
    pub async fn discover(&mut self) {
        self.providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        let mut tool_spec = ToolSpec::new();
        let mut tool_mapping = HashMap::new();

        for provider in &self.providers {
            if !provider.is_available().await {
                tracing::debug!(provider = provider.id(), "tool provider not available, skipping");
                continue;
            }
            match provider.discover_tools().await {
                Ok(tools) => {
                    for tool in tools {
                        if tool_mapping.contains_key(&tool.name) {
                            tracing::trace!(tool = %tool.name, provider = provider.id(), "tool already claimed by a higher-priority provider");
                            continue;
                        }
                        tool_mapping.insert(tool.name.clone(), provider.id().to_string());
                        tool_spec = tool_spec.register(tool);
                    }
                }
                Err(e) => tracing::warn!(provider = provider.id(), error = %e, "tool discovery failed"),
            }
        }

        self.tool_spec = tool_spec;
        self.tool_mapping = tool_mapping;
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    fn provider_for(&self, tool_name: &str) -> Option<&Arc<dyn ToolProvider>> {
        let provider_id = self.tool_mapping.get(tool_name)?;
        self.providers.iter().find(|p| p.id() == provider_id)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `LocalToolRunner`'s five built-ins as a `ToolProvider` so they can
/// sit in a `ToolRegistry` alongside higher-priority providers (MCP servers,
/// CLI wrappers) without changing `LocalToolRunner` itself.
pub struct BuiltinProvider {
    runner: LocalToolRunner,
}

impl BuiltinProvider {
    pub fn new() -> Self {
        Self { runner: LocalToolRunner::new() }
    }
}

impl Default for BuiltinProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for BuiltinProvider {
    fn id(&self) -> &str {
        "builtin"
    }

    fn priority(&self) -> i32 {
        -100
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn discover_tools(&self) -> Result<Vec<ToolDefinition>, ProviderError> {
        Ok(self.runner.tool_spec().all().cloned().collect())
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let ctx = ToolContext { session_id: String::new(), tick: 0, cancel: tokio_util::sync::CancellationToken::new() };
        self.runner.execute(call, &ctx).await
    }
}

#[async_trait]
impl ToolRunner for ToolRegistry {
    fn tool_spec(&self) -> &ToolSpec {
        &self.tool_spec
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolResult {
        match self.provider_for(&call.tool_name) {
            Some(provider) => provider.execute(call).await,
            None => ToolResult::failure(&call.tool_use_id, &call.tool_name, ToolError::not_found(&call.tool_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discovers_builtin_tools_through_the_registry() {
        let mut registry = ToolRegistry::new().register(Arc::new(BuiltinProvider::new()));
        registry.discover().await;

        assert!(registry.tool_spec().get("read_file").is_some());
        assert!(registry.tool_spec().get("run_command").is_some());
        assert_eq!(registry.provider_ids(), vec!["builtin"]);
    }

    #[tokio::test]
    async fn routes_execution_to_the_owning_provider() {
        let mut registry = ToolRegistry::new().register(Arc::new(BuiltinProvider::new()));
        registry.discover().await;

        let call = ToolCall::new("t1", "glob_search", serde_json::json!({"pattern": "*.rs"}));
        let ctx = ToolContext { session_id: "s1".into(), tick: 0, cancel: tokio_util::sync::CancellationToken::new() };
        let result = ToolRunner::execute(&registry, &call, &ctx).await;

        assert_eq!(result.tool_name, "glob_search");
    }

    #[tokio::test]
    async fn unknown_tool_name_fails_without_a_provider_match() {
        let mut registry = ToolRegistry::new().register(Arc::new(BuiltinProvider::new()));
        registry.discover().await;

        let call = ToolCall::new("t1", "nonexistent", serde_json::json!({}));
        let ctx = ToolContext { session_id: "s1".into(), tick: 0, cancel: tokio_util::sync::CancellationToken::new() };
        let result = ToolRunner::execute(&registry, &call, &ctx).await;

        assert!(result.is_error);
    }
}
