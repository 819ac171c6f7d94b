use super::chat::model::GeminiChatModel;
use crate::client::{Client, DEFAULT_TIMEOUT};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

impl GeminiProvider {
    pub fn default(api_key: &str) -> anyhow::Result<Self> {
        Self::new(DEFAULT_BASE_URL, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a provider against a custom models endpoint (e.g., for proxying).
    /// `base_url` already includes the API version and `/models` path.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| anyhow::anyhow!("Invalid API key format"))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        Ok(GeminiProvider {
            client: Client::new(headers, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn create_chat_model(&self, model_name: &str) -> GeminiChatModel {
        GeminiChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            model_name.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendError, ChatMessage, ChatModel, ChatRequest};
    use httpmock::prelude::*;

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(&server.url("/v1beta/models/"), "test-key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_chat_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash:generateContent")
                    .header("x-goog-api-key", "test-key")
                    .json_body(serde_json::json!({
                        "contents": [{"role": "user", "parts": [{"text": "fix tax bug"}]}],
                        "systemInstruction": {"parts": [{"text": "mentor"}]}
                    }));
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "Check the rounding."}]}
                    }]
                }));
            })
            .await;

        let model = provider(&server).create_chat_model("gemini-2.5-flash");
        let request =
            ChatRequest::new(vec![ChatMessage::user("fix tax bug")]).with_system_instruction("mentor");
        let reply = model.chat(&request).await.unwrap();

        assert_eq!(reply, ChatMessage::assistant("Check the rounding."));
        assert_eq!(model.name(), "gemini-2.5-flash");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_rate_limited_with_retry_info() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.5-flash:generateContent");
                then.status(429).json_body(serde_json::json!({
                    "error": {
                        "code": 429,
                        "message": "Resource has been exhausted",
                        "status": "RESOURCE_EXHAUSTED",
                        "details": [
                            {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "58s"}
                        ]
                    }
                }));
            })
            .await;

        let model = provider(&server).create_chat_model("gemini-2.5-flash");
        let err = model
            .chat(&ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.reason(), Some("RESOURCE_EXHAUSTED"));
        assert_eq!(err.retry_delay(), Some("58s"));
    }

    #[tokio::test]
    async fn test_chat_plain_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.5-flash:generateContent");
                then.status(500).body("internal");
            })
            .await;

        let model = provider(&server).create_chat_model("gemini-2.5-flash");
        let err = model
            .chat(&ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::status(500, "internal"));
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        assert!(GeminiProvider::new(DEFAULT_BASE_URL, "bad\nkey", DEFAULT_TIMEOUT).is_err());
    }
}
