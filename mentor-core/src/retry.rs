//! Retry policy for backend calls
//!
//! Two kinds of wait are computed here:
//! - an explicit delay the backend asked for (`retryDelay` in a RetryInfo
//!   detail), honoured as-is plus a small safety margin;
//! - capped exponential backoff with jitter when the backend only signalled
//!   a rate limit.

use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum backend invocations per completion call
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap on the exponential part, jitter excluded
    pub max_delay: Duration,
    /// Upper bound (inclusive) of the random jitter
    pub max_jitter: Duration,
    /// Added on top of a backend-provided delay
    pub retry_after_margin: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(300),
            retry_after_margin: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// `min(max_delay, base_delay * 2^attempt) + jitter`.
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn backoff(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exponential = self.base_delay.saturating_mul(factor);
        exponential.min(self.max_delay) + jitter.min(self.max_jitter)
    }

    pub fn random_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Wait before retrying after the backend asked for `retry_after_secs`
    pub fn retry_after_delay(&self, retry_after_secs: u64) -> Duration {
        Duration::from_secs(retry_after_secs) + self.retry_after_margin
    }
}

static RETRY_DELAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)m)?(?:(\d+)s)?").expect("retry delay pattern is valid"));

/// Parse a `retryDelay` value such as `"1m30s"` or `"58s"` into seconds.
///
/// Minutes and seconds are both optional and read independently; anything
/// that does not start with them (including the empty string) yields 0.
pub fn parse_retry_delay(delay: &str) -> u64 {
    let Some(caps) = RETRY_DELAY.captures(delay.trim()) else {
        return 0;
    };
    let component = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    component(1).saturating_mul(60).saturating_add(component(2))
}
