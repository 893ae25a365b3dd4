//! Rate-limiting port the content pipeline checks before a session's reply
//! is allowed to go out. Generalizes a per-client GCRA limiter into a seam
//! the gateway's concrete limiter implements.

use async_trait::async_trait;

/// The outcome of one rate-limit check.
#[derive(Debug, Clone, Default)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// An optional canned reply to send the caller in place of a normal
    /// response, when denied.
    pub reply: Option<String>,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self) -> RateLimitDecision;
}
