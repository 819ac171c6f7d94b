use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{Level, event, instrument};

use crate::error::BackendError;

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    timeout: Duration,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl Client {
    /// Build a client that sends `headers` on every request and gives up on
    /// any single request after `timeout`.
    pub fn new(headers: HeaderMap, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Client { client, timeout })
    }

    /// POST `request` as JSON and decode the JSON reply.
    ///
    /// Non-success replies become `BackendError::Status` carrying the raw
    /// response body as the message; providers refine it from there.
    #[instrument(level = "trace", skip(self, request))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> Result<T, BackendError>
    where
        U: reqwest::IntoUrl + std::fmt::Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(BackendError::status(status.as_u16(), error_body));
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        event!(Level::TRACE, response = text);

        serde_json::from_str::<T>(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn transport_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        id: u32,
    }

    fn client() -> Client {
        Client::new(HeaderMap::new(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_post_decodes_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/echo").json_body(serde_json::json!({"q": 1}));
                then.status(200).body(r#"{"id":7}"#);
            })
            .await;

        let echo: Echo = client()
            .post(server.url("/echo"), &serde_json::json!({"q": 1}))
            .await
            .unwrap();

        assert_eq!(echo, Echo { id: 7 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_keeps_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/echo");
                then.status(503).body("overloaded");
            })
            .await;

        let err = client()
            .post::<_, _, Echo>(server.url("/echo"), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::status(503, "overloaded"));
    }

    #[tokio::test]
    async fn test_post_reports_decode_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/echo");
                then.status(200).body("not json");
            })
            .await;

        let err = client()
            .post::<_, _, Echo>(server.url("/echo"), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn test_post_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/echo");
                then.status(200).body(r#"{"id":7}"#).delay(Duration::from_secs(2));
            })
            .await;

        let timeout = Duration::from_millis(200);
        let err = Client::new(HeaderMap::new(), timeout)
            .unwrap()
            .post::<_, _, Echo>(server.url("/echo"), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::Timeout(timeout));
    }
}
