//! Default `Renderer`: a pure function of `(component_state, timeline)` that
//! hands the timeline straight to the adapter, prefixed by an optional
//! system prompt, alongside whatever tools the running app registered. The
//! renderer port exists so a richer templated one can replace this without
//! touching the engine; this implementation is the minimal one that makes a
//! session usable out of the box.

use async_trait::async_trait;
use relaykit_application::{RenderError, RenderedInput, Renderer};
use relaykit_domain::{ComponentState, ContentBlock, Message, Role, TimelineEntry, ToolDefinition, ToolSpec};

pub struct SimpleRenderer {
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
}

impl SimpleRenderer {
    pub fn new() -> Self {
        Self { system_prompt: None, tools: Vec::new() }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tool_spec: &ToolSpec) -> Self {
        self.tools = tool_spec.all().cloned().collect();
        self
    }
}

impl Default for SimpleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for SimpleRenderer {
    async fn render(
        &self,
        component_state: &ComponentState,
        timeline: &[TimelineEntry],
    ) -> Result<(RenderedInput, ComponentState), RenderError> {
        let system = self
            .system_prompt
            .as_ref()
            .map(|prompt| vec![TimelineEntry::new(Message::new(Role::System, vec![ContentBlock::text(prompt.clone())]))])
            .unwrap_or_default();

        let rendered = RenderedInput {
            system,
            timeline: timeline.to_vec(),
            tools: self.tools.clone(),
            model_options: None,
            sections: std::collections::HashMap::new(),
            ephemeral: Vec::new(),
        };

        Ok((rendered, component_state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_domain::ContentBlock;

    #[tokio::test]
    async fn renders_system_prompt_and_passes_timeline_through() {
        let renderer = SimpleRenderer::new().with_system_prompt("be helpful");
        let timeline = vec![TimelineEntry::new(Message::new(Role::User, vec![ContentBlock::text("hi")]))];
        let state = ComponentState::new();

        let (rendered, _) = renderer.render(&state, &timeline).await.unwrap();

        assert_eq!(rendered.system.len(), 1);
        assert_eq!(rendered.timeline.len(), 1);
        assert!(rendered.tools.is_empty());
    }

    #[tokio::test]
    async fn carries_registered_tool_definitions() {
        let tool_spec = crate::tools::default_tool_spec();
        let renderer = SimpleRenderer::new().with_tools(&tool_spec);
        let state = ComponentState::new();

        let (rendered, _) = renderer.render(&state, &[]).await.unwrap();

        assert_eq!(rendered.tools.len(), tool_spec.all().count());
    }
}
