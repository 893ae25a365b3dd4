//! The model adapter port: the contract the session engine drives every
//! provider integration through.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use relaykit_domain::{AdapterAccumulator, AdapterDelta, Message, StopReason, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capabilities an adapter declares so the engine can adapt its behavior
/// (e.g. skip tool-calling prompts for an adapter that doesn't support it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterCapability {
    Streaming,
    ToolUse,
    Reasoning,
    Vision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Language,
    Embedding,
}

#[derive(Debug, Clone)]
pub struct AdapterMetadata {
    pub id: String,
    pub provider: String,
    pub model: Option<String>,
    pub kind: AdapterKind,
    pub capabilities: Vec<AdapterCapability>,
}

/// One normalized message + tool set sent to `execute_stream`/`execute`.
/// Produced by the session engine from a [`super::renderer::RenderedInput`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelInput {
    pub system: Vec<relaykit_domain::Message>,
    pub messages: Vec<relaykit_domain::Message>,
    pub tools: Vec<ToolDefinition>,
    pub model_options: Option<serde_json::Value>,
}

/// The non-streaming counterpart of folding an `AdapterDelta` sequence: a
/// complete assistant message plus the stop reason and usage the engine
/// needs to decide whether to keep ticking.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[derive(Debug, Error)]
#[error("adapter '{adapter}' error: {message}")]
pub struct AdapterPortError {
    pub adapter: String,
    pub message: String,
}

/// Provider-independent contract the session engine drives.
///
/// Implementations map a provider's wire chunks onto [`AdapterDelta`]; the
/// engine never sees provider-specific types. `metadata()` is synchronous and
/// cheap since the gateway's `apps`/`status` RPC methods call it per request.
///
/// Provider request/response shapes are carried as `serde_json::Value` rather
/// than an associated type: the engine holds adapters behind `Arc<dyn
/// ModelAdapter>`, and an associated type would give up object safety for a
/// benefit no caller needs (every call site round-trips through JSON at the
/// gateway boundary anyway).
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn metadata(&self) -> AdapterMetadata;

    /// Normalize a [`ModelInput`] into the provider's own request shape.
    /// Default just serializes the input as-is; adapters with a
    /// provider-specific wire format override this.
    fn prepare_input(&self, input: &ModelInput) -> serde_json::Value {
        serde_json::to_value(input).unwrap_or(serde_json::Value::Null)
    }

    /// Non-streaming call. Default drives [`Self::execute_stream`] to
    /// completion and folds the deltas through an [`AdapterAccumulator`], so
    /// adapters that only implement streaming still get a working
    /// non-streaming path for free; adapters with a genuine non-streaming
    /// provider endpoint should override this instead of paying for a stream
    /// they don't need.
    async fn execute(&self, input: ModelInput) -> Result<ModelOutput, AdapterPortError> {
        let mut stream = self.execute_stream(input).await?;
        let mut acc = AdapterAccumulator::new();
        while let Some(delta) = stream.next().await {
            acc.push(delta);
        }
        Ok(ModelOutput { message: acc.build(), stop_reason: acc.stop_reason(), usage: acc.usage() })
    }

    /// Stream a response as normalized deltas. The returned stream ends when
    /// the provider sends its final chunk or errors; a mid-stream
    /// `AdapterDelta::Error` does not necessarily end the stream early — the
    /// caller treats it as the accumulator does (see `AdapterAccumulator::push`).
    async fn execute_stream(
        &self,
        input: ModelInput,
    ) -> Result<BoxStream<'static, AdapterDelta>, AdapterPortError>;

    /// Map one provider wire chunk onto a normalized delta, or `None` if the
    /// chunk carries nothing the engine needs to see (e.g. a keep-alive).
    /// Default wraps the chunk verbatim as `AdapterDelta::Raw` so an adapter
    /// that hasn't implemented chunk mapping still surfaces something.
    fn map_chunk(&self, chunk: serde_json::Value) -> Option<AdapterDelta> {
        Some(AdapterDelta::Raw { data: chunk })
    }

    /// Non-streaming path: fold one complete provider response into a
    /// [`ModelOutput`]. Default expects `response` to carry a `"chunks"`
    /// array of the same wire chunks `execute_stream` would have produced,
    /// mapping each through [`Self::map_chunk`] and folding the result
    /// through an accumulator — adapters whose non-streaming endpoint
    /// returns a single complete object rather than a chunk array override
    /// this directly.
    fn process_output(&self, response: serde_json::Value) -> ModelOutput {
        let mut acc = AdapterAccumulator::new();
        if let Some(chunks) = response.get("chunks").and_then(|v| v.as_array()) {
            for chunk in chunks.clone() {
                if let Some(delta) = self.map_chunk(chunk) {
                    acc.push(delta);
                }
            }
        }
        ModelOutput { message: acc.build(), stop_reason: acc.stop_reason(), usage: acc.usage() }
    }

    /// Reconstruct an opaque provider response from an accumulated output,
    /// for adapters that need to replay or log the provider's own wire
    /// shape. Optional; defaults to `None` since most adapters have no use
    /// for a synthetic provider response.
    fn reconstruct_raw(&self, _accumulated: &ModelOutput) -> Option<serde_json::Value> {
        None
    }
}
