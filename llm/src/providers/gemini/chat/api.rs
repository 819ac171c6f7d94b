use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::{ChatMessage, ChatRequest};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl From<crate::api::Role> for Role {
    fn from(value: crate::api::Role) -> Self {
        match value {
            crate::api::Role::User => Role::User,
            crate::api::Role::Assistant => Role::Model,
        }
    }
}

impl From<Role> for crate::api::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::User => crate::api::Role::User,
            Role::Model => crate::api::Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) thought: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) text: Option<String>,

    #[serde(flatten)]
    pub(crate) extra: serde_json::Map<String, serde_json::Value>,
}

impl Part {
    pub fn new_text(text: impl Into<String>) -> Self {
        Part {
            thought: None,
            text: Some(text.into()),
            extra: serde_json::Map::new(),
        }
    }
}

// Gemini representation of messages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Content {
    // Absent on system instructions and on some blocked candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

impl Content {
    /// Concatenated answer text, skipping thought summaries
    pub(crate) fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

impl From<&ChatMessage> for Content {
    fn from(msg: &ChatMessage) -> Self {
        Content {
            role: Some(msg.role.into()),
            parts: vec![Part::new_text(msg.content.clone())],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<Content>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    fn from(request: &ChatRequest) -> Self {
        let system_instruction = request.system_instruction().map(|text| Content {
            role: None,
            parts: vec![Part::new_text(text)],
        });

        GenerateContentRequest {
            contents: request.messages().iter().map(Content::from).collect(),
            system_instruction,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Candidate {
    pub(crate) content: Option<Content>,

    #[serde(flatten)]
    pub(crate) extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,

    #[serde(flatten)]
    pub(crate) extra: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<GenerateContentResponse> for ChatMessage {
    type Error = BackendError;

    fn try_from(response: GenerateContentResponse) -> Result<Self, Self::Error> {
        let content = response
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .ok_or(BackendError::EmptyResponse)?;
        let role = content.role.unwrap_or(Role::Model);
        Ok(ChatMessage::new(role.into(), content.text()))
    }
}

/// `{"error": {...}}` envelope Google APIs use for failures
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ErrorStatus {
    #[serde(default)]
    pub(crate) message: String,

    pub(crate) status: Option<String>,

    /// Heterogeneous detail objects tagged by `@type`
    #[serde(default)]
    pub(crate) details: Vec<serde_json::Value>,
}

impl ErrorStatus {
    /// `retryDelay` of the first detail whose type tag mentions RetryInfo
    pub(crate) fn retry_delay(&self) -> Option<String> {
        self.details.iter().find_map(|detail| {
            let kind = detail.get("@type")?.as_str()?;
            if !kind.contains("RetryInfo") {
                return None;
            }
            detail
                .get("retryDelay")
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
    }
}

/// Lift the raw error body of a failed call into the structured fields of
/// `BackendError::Status`. Bodies that are not Google error envelopes are
/// kept as the message unchanged.
pub(crate) fn refine_error(error: BackendError) -> BackendError {
    let BackendError::Status { status, message, .. } = error else {
        return error;
    };

    match serde_json::from_str::<ErrorResponse>(&message) {
        Ok(parsed) => {
            let retry_delay = parsed.error.retry_delay();
            BackendError::Status {
                status,
                message: parsed.error.message,
                reason: parsed.error.status,
                retry_delay,
            }
        }
        Err(_) => BackendError::status(status, message),
    }
}
