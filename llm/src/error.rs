use std::time::Duration;

/// A failed backend call, as reported by the provider.
///
/// This is deliberately close to the wire: it keeps the HTTP status, the
/// provider's own status tag and any retry delay advisory verbatim so that
/// callers can decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-success status
    #[error("request failed with status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Provider status tag, e.g. `RESOURCE_EXHAUSTED`
        reason: Option<String>,
        /// Raw `retryDelay` from a RetryInfo detail, e.g. `"1m30s"`
        retry_delay: Option<String>,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no candidates")]
    EmptyResponse,
}

impl BackendError {
    /// Shorthand for a plain status failure without provider details
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        BackendError::Status {
            status,
            message: message.into(),
            reason: None,
            retry_delay: None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            BackendError::Status { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn retry_delay(&self) -> Option<&str> {
        match self {
            BackendError::Status { retry_delay, .. } => retry_delay.as_deref(),
            _ => None,
        }
    }
}
