//! Reference `ModelAdapter` that makes no network call: echoes the latest
//! user message back as streamed text, and recognizes a `tool:<name>
//! <json-args>` convention in that text to emit a tool call instead, so the
//! full tool-confirmation / tool-result round trip can be exercised without a
//! real provider. An owned, I/O-free session object with no process/TCP
//! dependency.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use relaykit_application::ports::model_adapter::{
    AdapterCapability, AdapterKind, AdapterMetadata, AdapterPortError, ModelAdapter, ModelInput, ModelOutput,
};
use relaykit_domain::adapter::{AdapterDelta, StopReason, Usage};
use relaykit_domain::message::{ContentBlock, Message, Role};

#[derive(Debug, Clone)]
pub struct EchoAdapter {
    id: String,
}

impl EchoAdapter {
    pub fn new() -> Self {
        Self { id: "echo".into() }
    }
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn last_user_text(input: &ModelInput) -> String {
    input.messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.text_content()).unwrap_or_default()
}

/// Parses `tool:<name> <json-args>` out of the latest user text, if present.
fn parse_tool_convention(text: &str) -> Option<(String, serde_json::Value)> {
    let rest = text.trim().strip_prefix("tool:")?;
    let (name, args) = rest.split_once(' ').unwrap_or((rest, "{}"));
    let input = serde_json::from_str(args.trim()).unwrap_or(serde_json::Value::Null);
    Some((name.trim().to_string(), input))
}

#[async_trait]
impl ModelAdapter for EchoAdapter {
    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: self.id.clone(),
            provider: "relaykit".into(),
            model: Some("echo-1".into()),
            kind: AdapterKind::Language,
            capabilities: vec![AdapterCapability::Streaming, AdapterCapability::ToolUse],
        }
    }

    /// A genuine non-streaming path, not the default trait's
    /// stream-then-fold: echoing back text or recognizing the tool
    /// convention needs no chunking, so this builds the final message
    /// directly.
    async fn execute(&self, input: ModelInput) -> Result<ModelOutput, AdapterPortError> {
        let last_user_text = last_user_text(&input);
        let usage = Usage {
            input_tokens: last_user_text.split_whitespace().count() as u64,
            output_tokens: 0,
            total_tokens: 0,
        };

        let (message, stop_reason) = if let Some((name, args)) = parse_tool_convention(&last_user_text) {
            (Message::assistant(vec![ContentBlock::tool_use("echo-call-1", name, args)]), StopReason::ToolUse)
        } else {
            (Message::assistant(vec![ContentBlock::text(last_user_text)]), StopReason::Stop)
        };

        Ok(ModelOutput { message, stop_reason, usage })
    }

    /// Echo's own chunks are just its deltas serialized as JSON; a real
    /// provider adapter would translate its wire format's chunk shape here
    /// instead.
    fn map_chunk(&self, chunk: serde_json::Value) -> Option<AdapterDelta> {
        serde_json::from_value(chunk).ok()
    }

    /// Replays the accumulated output as the same delta sequence
    /// `execute_stream` would have produced, so `process_output` can fold it
    /// back into an equivalent `ModelOutput`.
    fn reconstruct_raw(&self, accumulated: &ModelOutput) -> Option<serde_json::Value> {
        let mut deltas = vec![AdapterDelta::MessageStart];
        let text = accumulated.message.text_content();
        if !text.is_empty() {
            deltas.push(AdapterDelta::Text { delta: text });
        }
        for (tool_use_id, name, input) in accumulated.message.tool_uses() {
            deltas.push(AdapterDelta::ToolCallStart { id: tool_use_id.to_string(), name: name.to_string() });
            deltas.push(AdapterDelta::ToolCallEnd { id: tool_use_id.to_string(), input: Some(input.clone()) });
        }
        deltas.push(AdapterDelta::Usage { usage: accumulated.usage });
        deltas.push(AdapterDelta::MessageEnd { stop_reason: accumulated.stop_reason, usage: Some(accumulated.usage) });

        let chunks: Vec<serde_json::Value> =
            deltas.into_iter().map(|d| serde_json::to_value(d).expect("AdapterDelta always serializes")).collect();
        Some(serde_json::json!({ "chunks": chunks }))
    }

    async fn execute_stream(&self, input: ModelInput) -> Result<BoxStream<'static, AdapterDelta>, AdapterPortError> {
        let last_user_text = last_user_text(&input);

        let usage = Usage {
            input_tokens: last_user_text.split_whitespace().count() as u64,
            output_tokens: 0,
            total_tokens: 0,
        };

        let deltas: Vec<AdapterDelta> = if let Some((name, args)) = parse_tool_convention(&last_user_text) {
            vec![
                AdapterDelta::MessageStart,
                AdapterDelta::ToolCallStart { id: "echo-call-1".into(), name },
                AdapterDelta::ToolCallEnd { id: "echo-call-1".into(), input: Some(args) },
                AdapterDelta::Usage { usage },
                AdapterDelta::MessageEnd { stop_reason: StopReason::ToolUse, usage: Some(usage) },
            ]
        } else {
            vec![
                AdapterDelta::MessageStart,
                AdapterDelta::Text { delta: last_user_text },
                AdapterDelta::Usage { usage },
                AdapterDelta::MessageEnd { stop_reason: StopReason::Stop, usage: Some(usage) },
            ]
        };

        Ok(stream::iter(deltas).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_domain::Message;

    #[tokio::test]
    async fn echoes_plain_text_back() {
        let adapter = EchoAdapter::new();
        let input = ModelInput { messages: vec![Message::user("hello there")], ..Default::default() };
        let deltas: Vec<_> = adapter.execute_stream(input).await.unwrap().collect().await;
        assert!(matches!(&deltas[1], AdapterDelta::Text { delta } if delta == "hello there"));
    }

    #[tokio::test]
    async fn recognizes_the_tool_convention() {
        let adapter = EchoAdapter::new();
        let input = ModelInput {
            messages: vec![Message::user(r#"tool:calc {"expr": "2+2"}"#)],
            ..Default::default()
        };
        let deltas: Vec<_> = adapter.execute_stream(input).await.unwrap().collect().await;
        assert!(matches!(&deltas[1], AdapterDelta::ToolCallStart { name, .. } if name == "calc"));
        assert!(matches!(
            &deltas[2],
            AdapterDelta::ToolCallEnd { input, .. } if input.as_ref().unwrap() == &serde_json::json!({"expr": "2+2"})
        ));
    }

    #[tokio::test]
    async fn streaming_and_non_streaming_paths_agree_on_the_same_input() {
        let adapter = EchoAdapter::new();
        let input = ModelInput { messages: vec![Message::user("hello there")], ..Default::default() };

        let deltas: Vec<_> = adapter.execute_stream(input.clone()).await.unwrap().collect().await;
        let mut acc = relaykit_domain::AdapterAccumulator::new();
        for delta in deltas {
            acc.push(delta);
        }
        let from_stream = ModelOutput { message: acc.build(), stop_reason: acc.stop_reason(), usage: acc.usage() };

        let direct = adapter.execute(input).await.unwrap();

        assert_eq!(from_stream.message, direct.message);
        assert_eq!(from_stream.stop_reason, direct.stop_reason);
    }

    /// Property: `process_output(reconstruct_raw(accumulated))` reproduces
    /// the same canonical message and stop reason as `accumulated` itself,
    /// for both the plain-text and tool-call shapes.
    #[tokio::test]
    async fn reconstructed_raw_round_trips_through_process_output() {
        let adapter = EchoAdapter::new();

        for input in [
            ModelInput { messages: vec![Message::user("hello there")], ..Default::default() },
            ModelInput { messages: vec![Message::user(r#"tool:calc {"expr": "2+2"}"#)], ..Default::default() },
        ] {
            let direct = adapter.execute(input).await.unwrap();
            let raw = adapter.reconstruct_raw(&direct).expect("echo adapter reconstructs a raw response");
            let rebuilt = adapter.process_output(raw);

            assert_eq!(rebuilt.message, direct.message);
            assert_eq!(rebuilt.stop_reason, direct.stop_reason);
        }
    }
}
