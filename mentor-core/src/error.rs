/// Terminal outcome of a failed completion call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// Throttled on the final attempt. `retry_after_secs` is only set when
    /// that attempt carried an explicit delay.
    #[error("rate limited by the backend")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-retriable backend failure
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The attempt budget ran out without any classified failure
    #[error("no successful response after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("invalid completion request: {0}")]
    InvalidRequest(String),
}

/// Cache backend failure. Logged and treated as a miss, never surfaced.
#[derive(Debug, thiserror::Error)]
#[error("response cache unavailable: {0}")]
pub struct CacheError(pub String);

/// Errors from the mentor workflows built on top of completions
#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("conversation storage failed: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("missing or invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] askama::Error),

    #[error("model returned an empty file prediction")]
    EmptyPrediction,
}
