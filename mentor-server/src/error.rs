use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mentor_core::{CompletionError, MentorError};
use serde_json::{Value, json};
use tracing::{error, warn};

/// A failed API call. Each route picks its own JSON body; throttling is
/// reported the same way everywhere.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            retry_after_secs: None,
        }
    }

    pub fn bad_request(body: Value) -> Self {
        Self::new(StatusCode::BAD_REQUEST, body)
    }

    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("The mentor is busy right now. Please try again in {secs} seconds."),
            None => "The mentor is busy right now. Please try again shortly.".to_string(),
        };
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: json!({
                "success": false,
                "error": "rate_limited",
                "message": message,
                "retryAfterSeconds": retry_after_secs,
            }),
            retry_after_secs,
        }
    }

    /// A body the `Json` extractor refused, answered with the route's own shape
    pub fn rejected(rejection: JsonRejection, body: Value) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        Self::new(rejection.status(), body)
    }

    /// Map a workflow failure. Rate limits keep their advisory; other
    /// failures are logged and answered with `unavailable` as a 500.
    pub fn from_mentor(err: MentorError, unavailable: Value) -> Self {
        match err {
            MentorError::Completion(CompletionError::RateLimited { retry_after_secs }) => {
                warn!(?retry_after_secs, "mentor rate limited");
                Self::rate_limited(retry_after_secs)
            }
            MentorError::InvalidInput(message) => Self::bad_request(json!({
                "success": false,
                "error": message,
            })),
            other => {
                error!(error = %other, "mentor request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, unavailable)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
