//! Per-minute sliding window (GCRA, via `governor` — the same crate the
//! pack's `sven-gateway` uses for its per-IP auth rate limiting) plus a
//! per-day counter that resets on the civil-day boundary. GCRA has no notion
//! of a calendar day, so the day counter is tracked separately rather than
//! forced into a second `governor` quota.

use governor::clock::{Clock, DefaultClock};
use governor::{Quota, RateLimiter as GovernorLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of a [`RateLimiter::check`] call.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Present only when `allowed` is false and an `on_limited` hook is set.
    pub reply: Option<String>,
}

struct DayState {
    date: chrono::NaiveDate,
    count: u32,
}

pub struct RateLimiter {
    per_minute: governor::DefaultDirectRateLimiter,
    clock: DefaultClock,
    per_day: u32,
    day: Mutex<DayState>,
    on_limited: Option<Arc<dyn Fn(u32, i64) -> String + Send + Sync>>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).expect("per_minute must be > 0"));
        Self {
            per_minute: GovernorLimiter::direct(quota),
            clock: DefaultClock::default(),
            per_day,
            day: Mutex::new(DayState { date: chrono::Utc::now().date_naive(), count: 0 }),
            on_limited: None,
        }
    }

    /// `f(remaining, reset_ms)` builds the reply sent to a throttled caller,
    /// e.g. "you're sending messages too fast, try again in 12s".
    pub fn with_on_limited(mut self, f: impl Fn(u32, i64) -> String + Send + Sync + 'static) -> Self {
        self.on_limited = Some(Arc::new(f));
        self
    }

    pub async fn check(&self) -> RateLimitDecision {
        let now = chrono::Utc::now();
        let today = now.date_naive();
        {
            let mut day = self.day.lock().await;
            if day.date != today {
                day.date = today;
                day.count = 0;
            }
            if day.count >= self.per_day {
                let tomorrow = today.succ_opt().expect("not the end of time").and_hms_opt(0, 0, 0).unwrap();
                let reset_ms = (tomorrow - now.naive_utc()).num_milliseconds().max(0);
                let reply = self.on_limited.as_ref().map(|f| f(0, reset_ms));
                return RateLimitDecision { allowed: false, reply };
            }
        }

        match self.per_minute.check() {
            Ok(()) => {
                self.day.lock().await.count += 1;
                RateLimitDecision { allowed: true, reply: None }
            }
            Err(not_until) => {
                let reset_ms = not_until.wait_time_from(self.clock.now()).as_millis() as i64;
                let reply = self.on_limited.as_ref().map(|f| f(0, reset_ms));
                RateLimitDecision { allowed: false, reply }
            }
        }
    }
}

#[async_trait::async_trait]
impl relaykit_application::ports::rate_limit::RateLimiter for RateLimiter {
    async fn check(&self) -> relaykit_application::ports::rate_limit::RateLimitDecision {
        let decision = RateLimiter::check(self).await;
        relaykit_application::ports::rate_limit::RateLimitDecision { allowed: decision.allowed, reply: decision.reply }
    }
}
