//! The renderer port: turns a session's state into the next tick's model
//! input. The renderer itself (the declarative agent description and its
//! component tree) is an external collaborator; this port only fixes the
//! shape it must produce.

use async_trait::async_trait;
use relaykit_domain::{ComponentState, ContentBlock, TimelineEntry, ToolDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry the renderer contributes to the model input, alongside its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedEntry {
    pub entry: TimelineEntry,
}

/// The output of one render pass: everything the next model call needs.
#[derive(Debug, Clone, Default)]
pub struct RenderedInput {
    /// System-first messages, concatenated by the adapter before sending.
    pub system: Vec<TimelineEntry>,
    /// The conversational timeline to send this tick.
    pub timeline: Vec<TimelineEntry>,
    pub tools: Vec<ToolDefinition>,
    pub model_options: Option<serde_json::Value>,
    /// Named sections a renderer may expose for debugging/introspection.
    pub sections: std::collections::HashMap<String, String>,
    /// Content visible to the model this tick only, never persisted.
    pub ephemeral: Vec<ContentBlock>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
}

/// Produces a [`RenderedInput`] from a session's timeline and component state.
///
/// Implementations are expected to be pure functions of `(component_state,
/// timeline)`: given the same inputs, they render the same output. Any
/// internal state needed across ticks must round-trip through
/// `component_state`, not be held by the renderer instance itself — this is
/// what lets a session hibernate and resume without the renderer noticing.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        component_state: &ComponentState,
        timeline: &[TimelineEntry],
    ) -> Result<(RenderedInput, ComponentState), RenderError>;
}
