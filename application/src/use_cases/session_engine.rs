//! The session engine: the render → model → tool tick loop every session
//! runs. Provider-independent generalization of a single fixed-model
//! `run_agent` loop — see `hil.rs` for the confirmation-gating analogue
//! this module's `pending_confirmations` waiter map generalizes.

use crate::ports::confirmation::{ConfirmationDecision, ConfirmationPolicy};
use crate::ports::model_adapter::{ModelAdapter, ModelInput};
use crate::ports::renderer::Renderer;
use crate::ports::tool::{ToolContext, ToolRunner};
use crate::use_cases::content_pipeline::ContentPipeline;
use futures::stream::{FuturesUnordered, StreamExt};
use relaykit_domain::{
    AdapterAccumulator, AdapterDelta, ContentBlock, GuardError, Message, Role, Session,
    SessionSnapshot, StopReason, StreamEvent, ToolCall, ToolGuardrail, Usage,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex as AsyncMutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionEngineError {
    #[error("session '{0}' is not idle")]
    NotIdle(String),
    #[error("render failed: {0}")]
    RenderFailed(String),
    #[error("adapter failed: {0}")]
    AdapterFailed(String),
    #[error("execution cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionEngineConfig {
    /// Bound on concurrent non-sequential tool calls within one tick.
    pub fan_out_limit: usize,
    /// Safety valve against a runaway tool_use → tool_use loop.
    pub max_ticks_per_run: u64,
}

impl Default for SessionEngineConfig {
    fn default() -> Self {
        Self { fan_out_limit: 8, max_ticks_per_run: 64 }
    }
}

/// Live handle to one session: the domain entity plus the engine-owned
/// bookkeeping around it (event bus, confirmation waiters, current
/// execution's cancellation token).
pub struct SessionHandle {
    session: Arc<AsyncMutex<Session>>,
    events: Arc<relaykit_domain::EventBuffer<StreamEvent>>,
    pending_confirmations: Arc<StdMutex<HashMap<String, oneshot::Sender<ConfirmationDecision>>>>,
    current_cancel: Arc<StdMutex<Option<CancellationToken>>>,
    run_lock: Arc<AsyncMutex<()>>,
    /// The gateway (or other transport) attaches this the first time it
    /// learns about the session, so `run_one_tick` can offer assistant
    /// replies for delivery without the engine knowing who's listening.
    content_pipeline: tokio::sync::OnceCell<ContentPipeline>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(AsyncMutex::new(session)),
            events: Arc::new(relaykit_domain::EventBuffer::new()),
            pending_confirmations: Arc::new(StdMutex::new(HashMap::new())),
            current_cancel: Arc::new(StdMutex::new(None)),
            run_lock: Arc::new(AsyncMutex::new(())),
            content_pipeline: tokio::sync::OnceCell::new(),
        }
    }

    pub fn events(&self) -> Arc<relaykit_domain::EventBuffer<StreamEvent>> {
        self.events.clone()
    }

    /// Attach the content pipeline responsible for delivering this session's
    /// assistant replies. A no-op past the first call — one session keeps
    /// exactly one pipeline for its lifetime.
    pub fn set_content_pipeline(&self, pipeline: ContentPipeline) {
        let _ = self.content_pipeline.set(pipeline);
    }

    pub fn content_pipeline(&self) -> Option<&ContentPipeline> {
        self.content_pipeline.get()
    }

    pub async fn id(&self) -> String {
        self.session.lock().await.id().to_string()
    }

    pub async fn is_idle(&self) -> bool {
        self.session.lock().await.is_idle()
    }

    pub async fn status(&self) -> relaykit_domain::SessionStatus {
        self.session.lock().await.status()
    }

    pub async fn tick(&self) -> u64 {
        self.session.lock().await.tick()
    }

    pub async fn timeline(&self) -> Vec<relaykit_domain::TimelineEntry> {
        self.session.lock().await.timeline().to_vec()
    }

    pub async fn cumulative_usage(&self) -> Usage {
        self.session.lock().await.cumulative_usage()
    }
}

/// Open/closed state for one tick's synthetic "text"/"reasoning" blocks, plus
/// the tool-call id→name map `ToolCallEnd` needs to reconstruct a full
/// `ToolCall` event (the delta itself only repeats the id).
#[derive(Default)]
struct BlockTracker {
    text_open: bool,
    reasoning_open: bool,
    tool_names: HashMap<String, String>,
}

/// Drives one session's tick loop. Stateless: all mutable state lives on the
/// [`SessionHandle`], so one engine instance serves every session in an `App`.
pub struct SessionEngine {
    adapter: Arc<dyn ModelAdapter>,
    tool_runner: Arc<dyn ToolRunner>,
    renderer: Arc<dyn Renderer>,
    guardrail: Option<ToolGuardrail>,
    confirmation_policy: ConfirmationPolicy,
    config: SessionEngineConfig,
}

impl SessionEngine {
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        tool_runner: Arc<dyn ToolRunner>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            adapter,
            tool_runner,
            renderer,
            guardrail: None,
            confirmation_policy: ConfirmationPolicy::Interactive,
            config: SessionEngineConfig::default(),
        }
    }

    pub fn with_guardrail(mut self, guardrail: ToolGuardrail) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn with_confirmation_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.confirmation_policy = policy;
        self
    }

    pub fn with_config(mut self, config: SessionEngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn create_session(&self, id: impl Into<String>) -> SessionHandle {
        SessionHandle::new(Session::new(id))
    }

    pub fn hydrate(&self, snapshot: &SessionSnapshot) -> SessionHandle {
        SessionHandle::new(snapshot.hydrate())
    }

    pub async fn hibernate(
        &self,
        handle: &SessionHandle,
        timestamp: i64,
    ) -> Result<SessionSnapshot, SessionEngineError> {
        let session = handle.session.lock().await;
        if !session.is_idle() {
            return Err(SessionEngineError::NotIdle(session.id().to_string()));
        }
        Ok(SessionSnapshot::capture(&session, timestamp))
    }

    /// Resolve an outstanding `tool_confirmation_request`. Returns `false` if
    /// no waiter is registered for `tool_use_id` (already answered, or the
    /// execution moved on).
    pub fn respond_to_confirmation(
        &self,
        handle: &SessionHandle,
        tool_use_id: &str,
        decision: ConfirmationDecision,
    ) -> bool {
        let mut waiters = handle.pending_confirmations.lock().unwrap();
        match waiters.remove(tool_use_id) {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Cancel the in-flight tick, if any. The run loop observes this at the
    /// next cancellation-safe point and transitions back to idle.
    pub fn abort(&self, handle: &SessionHandle, reason: impl Into<String>) {
        let reason = reason.into();
        if let Some(token) = handle.current_cancel.lock().unwrap().as_ref() {
            info!("aborting session execution: {reason}");
            token.cancel();
        }
    }

    /// Enqueue a message. Starts the tick loop if the session is idle;
    /// otherwise the message is picked up at the next tick boundary (queue
    /// mode — see the Session Engine's steering contract).
    pub async fn send(&self, handle: Arc<SessionHandle>, message: Message) -> Result<(), SessionEngineError> {
        let should_start = {
            let mut session = handle.session.lock().await;
            session.enqueue(message);
            session.mark_queued()
        };
        if should_start {
            self.run(handle).await?;
        }
        Ok(())
    }

    /// Drive the tick loop until the timeline has no more work: either a
    /// terminal stop reason with an empty queue, or cancellation.
    async fn run(&self, handle: Arc<SessionHandle>) -> Result<(), SessionEngineError> {
        let _run_guard = handle.run_lock.lock().await;
        handle.events.push(StreamEvent::ExecutionStart);

        let mut ticks_this_run = 0u64;
        loop {
            ticks_this_run += 1;
            if ticks_this_run > self.config.max_ticks_per_run {
                warn!("session exceeded max_ticks_per_run, forcing stop");
                handle.events.push(StreamEvent::Error { message: "max ticks exceeded".into() });
                break;
            }

            let cancel = CancellationToken::new();
            *handle.current_cancel.lock().unwrap() = Some(cancel.clone());

            let outcome = self.run_one_tick(&handle, &cancel).await;
            *handle.current_cancel.lock().unwrap() = None;

            let keep_going = match outcome {
                Ok(keep_going) => keep_going,
                Err(SessionEngineError::Cancelled) => {
                    let mut session = handle.session.lock().await;
                    session.mark_aborted();
                    drop(session);
                    handle.events.push(StreamEvent::ExecutionEnd {
                        stop_reason: StopReason::Other,
                        new_timeline_entries: 0,
                    });
                    if let Some(pipeline) = handle.content_pipeline() {
                        pipeline.mark_idle().await;
                    }
                    break;
                }
                Err(e) => {
                    let mut session = handle.session.lock().await;
                    session.mark_aborted();
                    drop(session);
                    handle.events.push(StreamEvent::Error { message: e.to_string() });
                    handle.events.push(StreamEvent::ExecutionEnd {
                        stop_reason: StopReason::Error,
                        new_timeline_entries: 0,
                    });
                    if let Some(pipeline) = handle.content_pipeline() {
                        pipeline.mark_idle().await;
                    }
                    return Err(e);
                }
            };

            if !keep_going {
                break;
            }
        }
        Ok(())
    }

    /// One tick: render, call the model, resolve tool calls. Returns
    /// `Ok(true)` if the loop should continue (more tool calls or queued
    /// messages), `Ok(false)` if the session is now idle with nothing left.
    async fn run_one_tick(
        &self,
        handle: &SessionHandle,
        cancel: &CancellationToken,
    ) -> Result<bool, SessionEngineError> {
        let (tick, timeline_before, component_state, queued) = {
            let mut session = handle.session.lock().await;
            session.mark_running();
            let drained = session.drain_queue();
            for msg in drained {
                session.append(relaykit_domain::TimelineEntry::new(msg));
            }
            (
                session.tick(),
                session.timeline().to_vec(),
                session.component_state().clone(),
                session.has_queued(),
            )
        };
        let _ = queued;

        handle.events.push(StreamEvent::TickStart { tick });

        let (rendered, new_component_state) = self
            .renderer
            .render(&component_state, &timeline_before)
            .await
            .map_err(|e| SessionEngineError::RenderFailed(e.to_string()))?;

        {
            let mut session = handle.session.lock().await;
            *session.component_state_mut() = new_component_state;
        }

        let model_input = ModelInput {
            system: rendered.system.iter().map(|e| e.message.clone()).collect(),
            messages: rendered.timeline.iter().map(|e| e.message.clone()).collect(),
            tools: rendered.tools.clone(),
            model_options: rendered.model_options.clone(),
        };

        let mut stream = self
            .adapter
            .execute_stream(model_input)
            .await
            .map_err(|e| SessionEngineError::AdapterFailed(e.to_string()))?;

        let mut acc = AdapterAccumulator::new();
        let mut tracker = BlockTracker::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionEngineError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(delta) = next else { break };
            self.emit_for_delta(handle, &delta, &mut tracker);
            acc.push(delta);
        }

        let message = acc.build();
        let stop_reason = acc.stop_reason();
        let usage = acc.usage();

        {
            let mut session = handle.session.lock().await;
            session.append(relaykit_domain::TimelineEntry::new(message.clone()));
            session.add_usage(usage);
        }

        if let Some(pipeline) = handle.content_pipeline() {
            pipeline.offer(message.clone()).await;
        }

        let tool_uses: Vec<(String, String, serde_json::Value)> = message
            .tool_uses()
            .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
            .collect();

        let mut new_entries = 1;
        if !tool_uses.is_empty() {
            let results = self.resolve_tool_calls(handle, tick, tool_uses, cancel).await?;
            for result in &results {
                handle.events.push(StreamEvent::ToolResult {
                    call_id: result.tool_use_id.clone(),
                    name: result.tool_name.clone(),
                    result: result.content.clone(),
                    is_error: result.is_error,
                });
            }
            let content: Vec<ContentBlock> = results.into_iter().map(|r| r.into_content_block()).collect();
            let mut session = handle.session.lock().await;
            session.append(relaykit_domain::TimelineEntry::new(Message::new(Role::Tool, content)));
            new_entries += 1;
        }

        handle.events.push(StreamEvent::TickEnd { usage });

        {
            let mut session = handle.session.lock().await;
            session.advance_tick();
        }

        let terminal = matches!(
            stop_reason,
            StopReason::Stop | StopReason::MaxTokens | StopReason::ContentFilter | StopReason::Error
        );

        if !terminal {
            // stop_reason == ToolUse (or Unspecified/Other while still mid-run): loop again.
            return Ok(true);
        }

        handle.events.push(StreamEvent::ExecutionEnd { stop_reason, new_timeline_entries: new_entries });

        let mut session = handle.session.lock().await;
        if stop_reason == StopReason::Error {
            session.mark_aborted();
        } else {
            session.mark_completed();
            session.mark_idle();
        }
        let requeued = session.has_queued();
        if requeued {
            session.mark_queued();
        }
        drop(session);
        if !requeued {
            if let Some(pipeline) = handle.content_pipeline() {
                pipeline.mark_idle().await;
            }
        }
        Ok(!requeued)
    }

    /// Bracket text/reasoning/tool-call content with `content_block_start`/
    /// `_end` across one tick's delta stream; carries the tool id→name map
    /// since `ToolCallEnd` only repeats the id.
    fn emit_for_delta(&self, handle: &SessionHandle, delta: &AdapterDelta, tracker: &mut BlockTracker) {
        match delta {
            AdapterDelta::MessageStart => {
                // No public counterpart; the first content delta opens its own block.
            }
            AdapterDelta::Text { delta } => {
                if !tracker.text_open {
                    handle.events.push(StreamEvent::ContentBlockStart { id: "text".into(), block_type: "text".into() });
                    tracker.text_open = true;
                }
                handle.events.push(StreamEvent::ContentDelta { id: "text".into(), delta: delta.clone() });
            }
            AdapterDelta::Reasoning { delta } => {
                if !tracker.reasoning_open {
                    handle.events.push(StreamEvent::ContentBlockStart { id: "reasoning".into(), block_type: "reasoning".into() });
                    tracker.reasoning_open = true;
                }
                handle.events.push(StreamEvent::ContentDelta { id: "reasoning".into(), delta: delta.clone() });
            }
            AdapterDelta::ToolCallStart { id, name } => {
                tracker.tool_names.insert(id.clone(), name.clone());
                handle.events.push(StreamEvent::ContentBlockStart { id: id.clone(), block_type: "tool_use".into() });
                handle.events.push(StreamEvent::ToolCallStart { call_id: id.clone(), name: name.clone() });
            }
            AdapterDelta::ToolCallDelta { id, delta } => {
                handle.events.push(StreamEvent::ContentDelta { id: id.clone(), delta: delta.clone() });
            }
            AdapterDelta::ToolCallEnd { id, input } => {
                let name = tracker.tool_names.remove(id).unwrap_or_default();
                handle.events.push(StreamEvent::ToolCall {
                    call_id: id.clone(),
                    name,
                    input: input.clone().unwrap_or(serde_json::Value::Null),
                    summary: None,
                });
                handle.events.push(StreamEvent::ContentBlockEnd { id: id.clone() });
            }
            AdapterDelta::ToolCall { id, name, input } => {
                handle.events.push(StreamEvent::ContentBlockStart { id: id.clone(), block_type: "tool_use".into() });
                handle.events.push(StreamEvent::ToolCallStart { call_id: id.clone(), name: name.clone() });
                handle.events.push(StreamEvent::ToolCall {
                    call_id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                    summary: None,
                });
                handle.events.push(StreamEvent::ContentBlockEnd { id: id.clone() });
            }
            AdapterDelta::Usage { .. } => {
                // Folded by the accumulator; surfaced cumulatively at tick_end/execution_end.
            }
            AdapterDelta::MessageEnd { .. } => {
                self.close_open_blocks(handle, tracker);
            }
            AdapterDelta::Error { message } => {
                self.close_open_blocks(handle, tracker);
                handle.events.push(StreamEvent::Error { message: message.clone() });
            }
            AdapterDelta::Raw { .. } => {
                // Opaque provider payload; adapters map it through `map_chunk` before it reaches here.
            }
        }
    }

    fn close_open_blocks(&self, handle: &SessionHandle, tracker: &mut BlockTracker) {
        if tracker.text_open {
            handle.events.push(StreamEvent::ContentBlockEnd { id: "text".into() });
            tracker.text_open = false;
        }
        if tracker.reasoning_open {
            handle.events.push(StreamEvent::ContentBlockEnd { id: "reasoning".into() });
            tracker.reasoning_open = false;
        }
    }

    /// Gate each tool call through the guardrail and confirmation policy,
    /// then execute approved calls: sequential tools drain one at a time,
    /// the rest run concurrently bounded by `fan_out_limit`.
    async fn resolve_tool_calls(
        &self,
        handle: &SessionHandle,
        tick: u64,
        tool_uses: Vec<(String, String, serde_json::Value)>,
        cancel: &CancellationToken,
    ) -> Result<Vec<relaykit_domain::ToolResult>, SessionEngineError> {
        let session_id = handle.id().await;
        let mut approved = Vec::with_capacity(tool_uses.len());
        let mut results = Vec::with_capacity(tool_uses.len());

        for (tool_use_id, name, input) in tool_uses {
            if let Some(guardrail) = &self.guardrail {
                let envelope = relaykit_domain::GuardEnvelope::for_tool_call("tool:run", input.clone());
                if let Some((relaykit_domain::RuleAction::Deny, reason)) = guardrail.evaluate(&name, &envelope) {
                    let err = GuardError::guardrail_denied(&name, reason.unwrap_or_else(|| "denied by guardrail".to_string()));
                    results.push(relaykit_domain::ToolResult::rejected(&tool_use_id, &name, err.to_string()));
                    continue;
                }
            }

            let requires_confirmation = self
                .tool_runner
                .tool_spec()
                .get_resolved(&name)
                .map(|def| def.requires_confirmation)
                .unwrap_or(false);

            if requires_confirmation {
                match self.await_confirmation(handle, &tool_use_id, &name, &input).await {
                    ConfirmationDecision::Approve => {}
                    ConfirmationDecision::Reject { reason } => {
                        let reason = reason.unwrap_or_else(|| "not approved".to_string());
                        results.push(relaykit_domain::ToolResult::rejected(&tool_use_id, &name, reason));
                        continue;
                    }
                }
            }

            let sequential = self
                .tool_runner
                .tool_spec()
                .get_resolved(&name)
                .map(|def| def.sequential)
                .unwrap_or(false);
            approved.push((ToolCall::new(tool_use_id, name, input), sequential));
        }

        let ctx = ToolContext { session_id, tick, cancel: cancel.clone() };

        // Sequential calls drain one at a time, in order, before the batch.
        let (sequential, concurrent): (Vec<_>, Vec<_>) = approved.into_iter().partition(|(_, seq)| *seq);
        for (call, _) in sequential {
            results.push(self.tool_runner.execute(&call, &ctx).await);
        }

        if !concurrent.is_empty() {
            let semaphore = Arc::new(Semaphore::new(self.config.fan_out_limit));
            let mut futs = FuturesUnordered::new();
            for (call, _) in concurrent {
                let semaphore = semaphore.clone();
                let runner = self.tool_runner.clone();
                let ctx = ctx.clone();
                futs.push(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    runner.execute(&call, &ctx).await
                });
            }
            while let Some(result) = futs.next().await {
                results.push(result);
            }
        }

        Ok(results)
    }

    async fn await_confirmation(
        &self,
        handle: &SessionHandle,
        tool_use_id: &str,
        name: &str,
        arguments: &serde_json::Value,
    ) -> ConfirmationDecision {
        match self.confirmation_policy {
            ConfirmationPolicy::AutoApprove => return ConfirmationDecision::Approve,
            ConfirmationPolicy::AutoReject => {
                return ConfirmationDecision::Reject { reason: Some("auto-reject policy".into()) }
            }
            ConfirmationPolicy::Interactive => {}
        }

        let (tx, rx) = oneshot::channel();
        handle.pending_confirmations.lock().unwrap().insert(tool_use_id.to_string(), tx);

        handle.events.push(StreamEvent::ToolConfirmationRequest {
            tool_use_id: tool_use_id.to_string(),
            name: name.to_string(),
            arguments: arguments.clone(),
            message: None,
            metadata: None,
        });

        match rx.await {
            Ok(decision) => decision,
            Err(_) => {
                debug!("confirmation waiter dropped without a response for {tool_use_id}");
                ConfirmationDecision::Reject { reason: Some("confirmation channel closed".into()) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_adapter::{AdapterKind, AdapterMetadata, AdapterPortError};
    use crate::ports::renderer::{RenderError, RenderedInput};
    use async_trait::async_trait;
    use relaykit_domain::{ComponentState, TimelineEntry, ToolResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoingAdapter;

    #[async_trait]
    impl ModelAdapter for EchoingAdapter {
        fn metadata(&self) -> AdapterMetadata {
            AdapterMetadata { id: "echo".into(), provider: "test".into(), model: None, kind: AdapterKind::Language, capabilities: vec![] }
        }

        async fn execute_stream(
            &self,
            input: ModelInput,
        ) -> Result<futures::stream::BoxStream<'static, AdapterDelta>, AdapterPortError> {
            let text = input.messages.last().map(|m| m.text_content()).unwrap_or_default();
            let deltas = vec![
                AdapterDelta::Text { delta: format!("echo: {text}") },
                AdapterDelta::MessageEnd { stop_reason: StopReason::Stop, usage: Some(Usage { input_tokens: 1, output_tokens: 1, total_tokens: 2 }) },
            ];
            Ok(Box::pin(futures::stream::iter(deltas)))
        }
    }

    struct NoopRenderer;

    #[async_trait]
    impl Renderer for NoopRenderer {
        async fn render(
            &self,
            _component_state: &ComponentState,
            timeline: &[TimelineEntry],
        ) -> Result<(RenderedInput, ComponentState), RenderError> {
            Ok((
                RenderedInput { timeline: timeline.to_vec(), ..Default::default() },
                ComponentState::new(),
            ))
        }
    }

    struct EmptyToolRunner {
        spec: relaykit_domain::ToolSpec,
        calls: AtomicUsize,
    }

    impl EmptyToolRunner {
        fn new() -> Self {
            Self { spec: relaykit_domain::ToolSpec::new(), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ToolRunner for EmptyToolRunner {
        fn tool_spec(&self) -> &relaykit_domain::ToolSpec {
            &self.spec
        }

        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ToolResult::text_success(&call.tool_use_id, &call.tool_name, "ok")
        }
    }

    fn engine() -> SessionEngine {
        SessionEngine::new(Arc::new(EchoingAdapter), Arc::new(EmptyToolRunner::new()), Arc::new(NoopRenderer))
    }

    /// Emits a tool call on tick 1 (ending the tick with `StopReason::ToolUse`
    /// so the run loop immediately ticks again), then a plain text reply on
    /// tick 2.
    struct ToolCallingAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelAdapter for ToolCallingAdapter {
        fn metadata(&self) -> AdapterMetadata {
            AdapterMetadata { id: "tool-caller".into(), provider: "test".into(), model: None, kind: AdapterKind::Language, capabilities: vec![] }
        }

        async fn execute_stream(
            &self,
            _input: ModelInput,
        ) -> Result<futures::stream::BoxStream<'static, AdapterDelta>, AdapterPortError> {
            let tick = self.calls.fetch_add(1, Ordering::SeqCst);
            let deltas = if tick == 0 {
                vec![
                    AdapterDelta::ToolCallStart { id: "call1".into(), name: "read_file".into() },
                    AdapterDelta::ToolCallDelta { id: "call1".into(), delta: "{\"path\":\"a\"}".into() },
                    AdapterDelta::ToolCallEnd { id: "call1".into(), input: Some(serde_json::json!({"path": "a"})) },
                    AdapterDelta::MessageEnd { stop_reason: StopReason::ToolUse, usage: Some(Usage { input_tokens: 1, output_tokens: 1, total_tokens: 2 }) },
                ]
            } else {
                vec![
                    AdapterDelta::Text { delta: "done".into() },
                    AdapterDelta::MessageEnd { stop_reason: StopReason::Stop, usage: Some(Usage { input_tokens: 1, output_tokens: 1, total_tokens: 2 }) },
                ]
            };
            Ok(Box::pin(futures::stream::iter(deltas)))
        }
    }

    #[tokio::test]
    async fn tool_call_events_bracket_correctly_across_ticks() {
        let engine = SessionEngine::new(
            Arc::new(ToolCallingAdapter { calls: AtomicUsize::new(0) }),
            Arc::new(EmptyToolRunner::new()),
            Arc::new(NoopRenderer),
        );
        let handle = Arc::new(engine.create_session("s1"));
        engine.send(handle.clone(), Message::user("hello")).await.unwrap();
        assert!(handle.is_idle().await);

        let events = handle.events.history();
        let type_names: Vec<&str> = events.iter().map(|e| e.type_name()).collect();

        assert_eq!(type_names.iter().filter(|&&t| t == "tool_call_start").count(), 1);
        assert_eq!(type_names.iter().filter(|&&t| t == "tool_call").count(), 1);
        assert_eq!(type_names.iter().filter(|&&t| t == "tool_result").count(), 1);
        assert_eq!(type_names.iter().filter(|&&t| t == "tick_end").count(), 2);
        assert_eq!(type_names.iter().filter(|&&t| t == "execution_end").count(), 1);

        let start = events.iter().position(|e| matches!(e, StreamEvent::ContentBlockStart { id, .. } if id == "call1")).unwrap();
        let call_start = events.iter().position(|e| matches!(e, StreamEvent::ToolCallStart { call_id, .. } if call_id == "call1")).unwrap();
        let call = events.iter().position(|e| matches!(e, StreamEvent::ToolCall { call_id, .. } if call_id == "call1")).unwrap();
        let end = events.iter().position(|e| matches!(e, StreamEvent::ContentBlockEnd { id } if id == "call1")).unwrap();
        let result = events.iter().position(|e| matches!(e, StreamEvent::ToolResult { call_id, .. } if call_id == "call1")).unwrap();

        assert!(start < call_start, "content_block_start must precede any delta for that id");
        assert!(call_start < call);
        assert!(call < end);
        assert!(end < result);
    }

    #[tokio::test]
    async fn send_on_idle_session_runs_to_completion() {
        let engine = engine();
        let handle = Arc::new(engine.create_session("s1"));
        engine.send(handle.clone(), Message::user("hello")).await.unwrap();
        assert!(handle.is_idle().await);

        let session = handle.session.lock().await;
        assert_eq!(session.timeline().len(), 2); // user message + assistant reply
        assert_eq!(session.tick(), 1);
    }

    #[tokio::test]
    async fn hibernate_requires_idle_session() {
        let engine = engine();
        let handle = engine.create_session("s1");
        let snapshot = engine.hibernate(&handle, 1000).await.unwrap();
        assert_eq!(snapshot.session_id, "s1");
    }

    #[tokio::test]
    async fn respond_to_confirmation_returns_false_with_no_waiter() {
        let engine = engine();
        let handle = engine.create_session("s1");
        let resolved = engine.respond_to_confirmation(&handle, "nope", ConfirmationDecision::Approve);
        assert!(!resolved);
    }

    struct RecordingSink {
        delivered: AtomicUsize,
        completed: StdMutex<Vec<bool>>,
    }

    #[async_trait]
    impl crate::ports::delivery::DeliverySink for RecordingSink {
        async fn deliver(
            &self,
            messages: Vec<Message>,
            is_complete: bool,
        ) -> Result<(), crate::ports::delivery::DeliveryError> {
            self.delivered.fetch_add(messages.len(), Ordering::SeqCst);
            self.completed.lock().unwrap().push(is_complete);
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_session_with_a_content_pipeline_delivers_its_assistant_reply_on_idle() {
        let engine = engine();
        let handle = Arc::new(engine.create_session("s1"));
        let sink = Arc::new(RecordingSink { delivered: AtomicUsize::new(0), completed: StdMutex::new(Vec::new()) });
        let pipeline = ContentPipeline::new(
            relaykit_domain::ContentPolicy::Full,
            sink.clone(),
            crate::use_cases::content_pipeline::ContentPipelineConfig {
                timing: Some(crate::use_cases::content_pipeline::DeliveryTiming::OnIdle),
                ..Default::default()
            },
        );
        handle.set_content_pipeline(pipeline);

        engine.send(handle.clone(), Message::user("hello")).await.unwrap();
        assert!(handle.is_idle().await);

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.completed.lock().unwrap(), vec![true]);
    }
}
