//! Outbound content pipeline: filters assistant messages through a
//! `ContentPolicy`, batches them per a `DeliveryTiming` strategy, rate-limits,
//! and retries delivery against a `DeliverySink` with exponential backoff.
//! Generalizes a synchronous, infallible local-write logger into an async,
//! retryable delivery path suited to a real network connector.

use crate::ports::delivery::{DeliveryError, DeliverySink};
use crate::ports::rate_limit::{RateLimitDecision, RateLimiter};
use relaykit_domain::{ContentPolicy, Message, Role};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Controls when a pending batch is actually handed to the `DeliverySink`.
#[derive(Debug, Clone, Copy)]
pub enum DeliveryTiming {
    /// Deliver on every poke.
    Immediate,
    /// Deliver only on `mark_idle()`, and only if something is pending.
    OnIdle,
    /// Deliver `millis` after the last poke with no further pokes.
    /// `mark_idle()` flushes immediately and cancels the timer.
    Debounced { millis: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { base_ms: 250, max_ms: 10_000, max_attempts: 5 }
    }
}

#[derive(Default)]
pub struct ContentPipelineConfig {
    pub timing: Option<DeliveryTiming>,
    pub retry: Option<RetryConfig>,
    /// Called with the exhausted batch once `retry.max_attempts` is used up.
    pub on_exhausted: Option<Arc<dyn Fn(DeliveryError, Vec<Message>) + Send + Sync>>,
    /// Gates inbound sends, not outbound delivery: the gateway calls
    /// `check_rate_limit` before handing a user message to the engine, so a
    /// denial can be answered with a synthetic assistant reply through this
    /// same pipeline instead of an RPC error.
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
}

struct State {
    pending: Vec<Message>,
    debounce: Option<JoinHandle<()>>,
}

struct Inner {
    policy: ContentPolicy,
    sink: Arc<dyn DeliverySink>,
    timing: DeliveryTiming,
    retry: RetryConfig,
    on_exhausted: Option<Arc<dyn Fn(DeliveryError, Vec<Message>) + Send + Sync>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    state: Mutex<State>,
}

/// Drives one session's outbound delivery. Cheap to clone (wraps an `Arc`) so
/// a debounce timer can hold its own handle back into the pipeline.
#[derive(Clone)]
pub struct ContentPipeline(Arc<Inner>);

impl ContentPipeline {
    pub fn new(policy: ContentPolicy, sink: Arc<dyn DeliverySink>, config: ContentPipelineConfig) -> Self {
        Self(Arc::new(Inner {
            policy,
            sink,
            timing: config.timing.unwrap_or(DeliveryTiming::Immediate),
            retry: config.retry.unwrap_or_default(),
            on_exhausted: config.on_exhausted,
            rate_limiter: config.rate_limiter,
            state: Mutex::new(State { pending: Vec::new(), debounce: None }),
        }))
    }

    /// Checks whether a new inbound send is allowed. No limiter configured
    /// means unlimited. The caller (the gateway) is responsible for turning a
    /// denial's `reply` into a synthetic assistant message offered back
    /// through this same pipeline, not an RPC error.
    pub async fn check_rate_limit(&self) -> Option<RateLimitDecision> {
        match &self.0.rate_limiter {
            Some(limiter) => Some(limiter.check().await),
            None => None,
        }
    }

    /// Offer one assistant message for delivery. User messages are never
    /// echoed back and are rejected here regardless of policy.
    pub async fn offer(&self, message: Message) {
        if message.role != Role::Assistant {
            return;
        }
        let Some(filtered) = self.0.policy.apply(&message) else { return };
        {
            let mut state = self.0.state.lock().await;
            state.pending.push(filtered);
        }
        self.poke().await;
    }

    async fn poke(&self) {
        match self.0.timing {
            DeliveryTiming::Immediate => self.flush(false).await,
            DeliveryTiming::OnIdle => {}
            DeliveryTiming::Debounced { millis } => self.arm_debounce(millis).await,
        }
    }

    async fn arm_debounce(&self, millis: u64) {
        let mut state = self.0.state.lock().await;
        if let Some(handle) = state.debounce.take() {
            handle.abort();
        }
        let this = self.clone();
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            this.flush(false).await;
        }));
    }

    /// Called at `execution_end`: flush any pending batch immediately and
    /// cancel a running debounce timer.
    pub async fn mark_idle(&self) {
        {
            let mut state = self.0.state.lock().await;
            if let Some(handle) = state.debounce.take() {
                handle.abort();
            }
        }
        self.flush(true).await;
    }

    /// Force delivery of whatever is pending, if anything.
    pub async fn flush(&self, is_complete: bool) {
        let batch = {
            let mut state = self.0.state.lock().await;
            std::mem::take(&mut state.pending)
        };
        if batch.is_empty() {
            return;
        }
        self.deliver_with_retry(batch, is_complete).await;
    }

    /// Stop any running debounce timer without delivering what's pending.
    pub async fn destroy(&self) {
        let mut state = self.0.state.lock().await;
        if let Some(handle) = state.debounce.take() {
            handle.abort();
        }
    }

    async fn deliver_with_retry(&self, messages: Vec<Message>, is_complete: bool) {
        let mut attempt = 0u32;
        loop {
            match self.0.sink.deliver(messages.clone(), is_complete).await {
                Ok(()) => return,
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.0.retry.max_attempts {
                        error!("delivery exhausted after {attempt} attempts: {err}");
                        if let Some(hook) = &self.0.on_exhausted {
                            hook(err, messages);
                        }
                        return;
                    }
                    let delay_ms = self.0.retry.base_ms.saturating_mul(1u64 << attempt.min(20)).min(self.0.retry.max_ms);
                    warn!("delivery failed (attempt {attempt}/{}), retrying in {delay_ms}ms: {err}", self.0.retry.max_attempts);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_domain::ContentBlock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait::async_trait]
    impl DeliverySink for RecordingSink {
        async fn deliver(&self, _messages: Vec<Message>, _is_complete: bool) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                Err(DeliveryError("transient".into()))
            } else {
                Ok(())
            }
        }
    }

    fn assistant(text: &str) -> Message {
        Message::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    #[tokio::test]
    async fn immediate_timing_delivers_on_every_offer() {
        let sink = Arc::new(RecordingSink { calls: AtomicUsize::new(0), fail_until: 0 });
        let pipeline = ContentPipeline::new(ContentPolicy::Full, sink.clone(), ContentPipelineConfig::default());
        pipeline.offer(assistant("hi")).await;
        pipeline.offer(assistant("there")).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn on_idle_timing_batches_until_mark_idle() {
        let sink = Arc::new(RecordingSink { calls: AtomicUsize::new(0), fail_until: 0 });
        let pipeline = ContentPipeline::new(
            ContentPolicy::Full,
            sink.clone(),
            ContentPipelineConfig { timing: Some(DeliveryTiming::OnIdle), ..Default::default() },
        );
        pipeline.offer(assistant("a")).await;
        pipeline.offer(assistant("b")).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        pipeline.mark_idle().await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn user_messages_are_never_delivered() {
        let sink = Arc::new(RecordingSink { calls: AtomicUsize::new(0), fail_until: 0 });
        let pipeline = ContentPipeline::new(ContentPolicy::Full, sink.clone(), ContentPipelineConfig::default());
        pipeline.offer(Message::user("hello")).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_until_success_within_max_attempts() {
        let sink = Arc::new(RecordingSink { calls: AtomicUsize::new(0), fail_until: 2 });
        let pipeline = ContentPipeline::new(
            ContentPolicy::Full,
            sink.clone(),
            ContentPipelineConfig {
                retry: Some(RetryConfig { base_ms: 1, max_ms: 5, max_attempts: 5 }),
                ..Default::default()
            },
        );
        pipeline.offer(assistant("hi")).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_invoke_the_hook() {
        let sink = Arc::new(RecordingSink { calls: AtomicUsize::new(0), fail_until: 100 });
        let hit = Arc::new(AtomicUsize::new(0));
        let hit2 = hit.clone();
        let pipeline = ContentPipeline::new(
            ContentPolicy::Full,
            sink,
            ContentPipelineConfig {
                retry: Some(RetryConfig { base_ms: 1, max_ms: 2, max_attempts: 2 }),
                on_exhausted: Some(Arc::new(move |_err, _msgs| {
                    hit2.fetch_add(1, Ordering::SeqCst);
                })),
                ..Default::default()
            },
        );
        pipeline.offer(assistant("hi")).await;
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }
}
