//! Maps raw backend failures onto the retry taxonomy.
//!
//! This is the only place that looks inside a `BackendError`; everything
//! downstream works with `Failure`.

use llm::BackendError;

use crate::retry::parse_retry_delay;

const RATE_LIMIT_STATUS: u16 = 429;
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The backend named how long to wait
    RetryAfter { seconds: u64 },
    /// Throttled without a delay advisory
    RateLimited,
    /// Anything else; never retried
    Fatal,
}

pub fn classify(error: &BackendError) -> Failure {
    if let Some(delay) = error.retry_delay() {
        return Failure::RetryAfter {
            seconds: parse_retry_delay(delay),
        };
    }

    let throttled = error.status_code() == Some(RATE_LIMIT_STATUS)
        || error.reason() == Some(RESOURCE_EXHAUSTED);
    if throttled {
        Failure::RateLimited
    } else {
        Failure::Fatal
    }
}
