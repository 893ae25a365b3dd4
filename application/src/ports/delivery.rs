//! Outbound delivery port the content pipeline drives after filtering a
//! message through a `ContentPolicy`. Generalizes a synchronous, infallible,
//! local-file log write into an async, retryable contract suited to a real
//! network connector.

use async_trait::async_trait;
use relaykit_domain::Message;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Receives filtered, timing-buffered batches of assistant messages.
/// Implementations (a chat connector, a webhook, a test recorder) live in
/// infrastructure/presentation.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// `is_complete` is true when this batch closes out the execution (the
    /// tick that produced it ended the run), false for a mid-run flush.
    async fn deliver(&self, messages: Vec<Message>, is_complete: bool) -> Result<(), DeliveryError>;
}
