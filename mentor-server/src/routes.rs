//! JSON handlers for the browser-facing API

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use mentor_core::{ChatSend, ConversationTurn, FileFinderRequest, TopicId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::AppState;
use crate::error::ApiError;
use crate::session::Session;

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintBody {
    pub user_message: Option<String>,
    pub issue: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HintResponse {
    pub response: String,
    pub cached: bool,
}

/// `POST /api/mentor`
pub async fn mentor_hint(
    State(state): State<AppState>,
    body: Result<Json<HintBody>, JsonRejection>,
) -> Result<Json<HintResponse>, ApiError> {
    let Json(body) =
        body.map_err(|e| ApiError::rejected(e, json!({ "error": "Invalid request body." })))?;
    let (Some(user_message), Some(issue), Some(code)) = (
        present(body.user_message),
        present(body.issue),
        present(body.code),
    ) else {
        return Err(ApiError::bad_request(
            json!({ "error": "Missing necessary context." }),
        ));
    };

    let result = state
        .mentor
        .hint(&issue, &code, &user_message)
        .await
        .map_err(|e| {
            ApiError::from_mentor(
                e,
                json!({ "error": "The mentor is unavailable right now. Please try again later." }),
            )
        })?;

    Ok(Json(HintResponse {
        response: result.text,
        cached: result.cached,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendBody {
    pub prompt: Option<String>,
    pub issue_id: Option<String>,
    pub issue: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatSendResponse {
    pub success: bool,
    pub message: ConversationTurn,
    pub cached: bool,
}

/// `POST /api/chat/send`
pub async fn chat_send(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<ChatSendBody>, JsonRejection>,
) -> Response {
    let response = match send(&state, &session, body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => e.into_response(),
    };
    session.attach_cookie(response, state.secure_cookies)
}

async fn send(
    state: &AppState,
    session: &Session,
    body: Result<Json<ChatSendBody>, JsonRejection>,
) -> Result<ChatSendResponse, ApiError> {
    let Json(body) = body.map_err(|e| {
        ApiError::rejected(e, json!({ "success": false, "message": "Invalid request body" }))
    })?;
    let Some(prompt) = present(body.prompt) else {
        return Err(ApiError::bad_request(
            json!({ "success": false, "message": "Missing prompt" }),
        ));
    };

    let message = ChatSend {
        prompt,
        topic_id: present(body.issue_id).map(TopicId::from_string),
        issue: present(body.issue),
        code: present(body.code),
    };
    let reply = state
        .mentor
        .send_chat(&session.id, message)
        .await
        .map_err(|e| ApiError::from_mentor(e, json!({ "success": false, "message": "AI chat failed" })))?;

    Ok(ChatSendResponse {
        success: true,
        message: reply.message,
        cached: reply.cached,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub issue_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<ConversationTurn>,
}

/// `GET /api/chat/history?issueId=`
pub async fn chat_history(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let topic_id = present(query.issue_id).map(TopicId::from_string);
    let response = match state.mentor.history(&session.id, topic_id.as_ref()).await {
        Ok(history) => Json(HistoryResponse {
            success: true,
            history,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "failed to load chat history");
            ApiError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "message": "Could not load chat history" }),
            )
            .into_response()
        }
    };
    session.attach_cookie(response, state.secure_cookies)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFinderBody {
    #[serde(default)]
    pub issue_title: String,
    #[serde(default)]
    pub issue_body: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// Repository paths as listed by the source-control API
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileFinderResponse {
    pub path: String,
    pub cached: bool,
}

/// `POST /api/file-finder`
pub async fn file_finder(
    State(state): State<AppState>,
    body: Result<Json<FileFinderBody>, JsonRejection>,
) -> Result<Json<FileFinderResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        ApiError::rejected(e, json!({ "path": null, "error": "Invalid request body" }))
    })?;
    let (Some(owner), Some(repo)) = (present(body.owner), present(body.repo)) else {
        return Err(ApiError::bad_request(
            json!({ "success": false, "message": "Missing owner/repo" }),
        ));
    };

    let suggestion = state
        .mentor
        .suggest_file(FileFinderRequest {
            issue_title: body.issue_title,
            issue_body: body.issue_body,
            owner,
            repo,
            files: body.files,
        })
        .await
        .map_err(|e| {
            ApiError::from_mentor(e, json!({ "path": null, "error": "Failed to predict file" }))
        })?;

    Ok(Json(FileFinderResponse {
        path: suggestion.path,
        cached: suggestion.cached,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}
