//! Anonymous browser sessions carried in the `chat_session_id` cookie

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use mentor_core::SessionId;
use tracing::warn;

pub const SESSION_COOKIE: &str = "chat_session_id";

/// 30 days
const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// The caller's session. A fresh one is minted when the request carries no
/// cookie; [`Session::attach_cookie`] then hands it to the browser.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub is_new: bool,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match session_cookie(headers) {
            Some(id) => Self { id, is_new: false },
            None => Self {
                id: SessionId::new(),
                is_new: true,
            },
        }
    }

    /// Add `Set-Cookie` to `response` when the session was just created
    pub fn attach_cookie(&self, mut response: Response, secure: bool) -> Response {
        if !self.is_new {
            return response;
        }
        match HeaderValue::from_str(&session_cookie_value(&self.id, secure)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "could not encode session cookie"),
        }
        response
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::from_headers(&parts.headers))
    }
}

/// First non-empty `chat_session_id` across all `Cookie` headers
fn session_cookie(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| SessionId::from_string(value.trim()))
}

pub fn session_cookie_value(id: &SessionId, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
