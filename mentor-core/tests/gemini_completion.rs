use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use llm::GeminiProvider;
use mentor_core::{
    CompletionConfig, CompletionError, CompletionRequest, ManualClock, MemoryResponseCache,
    ResilientCompletionClient, RetryPolicy, TopicId,
};
use serde_json::json;

const MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client(server: &MockServer, max_attempts: u32) -> (ResilientCompletionClient, Arc<ManualClock>) {
    client_with_timeout(server, max_attempts, Duration::from_secs(5))
}

fn client_with_timeout(
    server: &MockServer,
    max_attempts: u32,
    timeout: Duration,
) -> (ResilientCompletionClient, Arc<ManualClock>) {
    let provider = GeminiProvider::new(&server.url("/v1beta/models"), "test-key", timeout).unwrap();
    let clock = Arc::new(ManualClock::default());
    let cache = Arc::new(MemoryResponseCache::new(clock.clone()));
    let config = CompletionConfig {
        retry: RetryPolicy::with_max_attempts(max_attempts),
        ..Default::default()
    };
    let client = ResilientCompletionClient::new(
        Arc::new(provider.create_chat_model("gemini-2.5-flash")),
        cache,
        clock.clone(),
        config,
    );
    (client, clock)
}

fn request() -> CompletionRequest {
    CompletionRequest::new(TopicId::from_string("acme/repo#42"), "fix tax bug")
        .with_system_instruction("mentor")
}

#[tokio::test]
async fn test_success_is_cached() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(MODEL_PATH);
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Look at the rounding."}]}
                }]
            }));
        })
        .await;

    let (client, _) = client(&server, 4);
    let first = client.complete(request()).await.unwrap();
    let second = client.complete(request()).await.unwrap();

    assert_eq!(first.text, "Look at the rounding.");
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_quota_error_with_retry_info() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(MODEL_PATH);
            then.status(429).json_body(json!({
                "error": {
                    "code": 429,
                    "message": "You exceeded your current quota.",
                    "status": "RESOURCE_EXHAUSTED",
                    "details": [
                        {
                            "@type": "type.googleapis.com/google.rpc.QuotaFailure",
                            "violations": []
                        },
                        {
                            "@type": "type.googleapis.com/google.rpc.RetryInfo",
                            "retryDelay": "7s"
                        }
                    ]
                }
            }));
        })
        .await;

    let (client, clock) = client(&server, 2);
    let err = client.complete(request()).await.unwrap_err();

    assert_eq!(err, CompletionError::RateLimited { retry_after_secs: Some(7) });
    assert_eq!(mock.hits_async().await, 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(7_200)]);
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(MODEL_PATH);
            then.status(400).json_body(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid.",
                    "status": "INVALID_ARGUMENT"
                }
            }));
        })
        .await;

    let (client, clock) = client(&server, 4);
    let err = client.complete(request()).await.unwrap_err();

    match err {
        CompletionError::BackendUnavailable(cause) => assert!(cause.contains("API key not valid")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.hits_async().await, 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_slow_backend_times_out_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(MODEL_PATH);
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({
                    "candidates": [{"content": {"role": "model", "parts": [{"text": "too late"}]}}]
                }));
        })
        .await;

    let (client, clock) = client_with_timeout(&server, 4, Duration::from_millis(200));
    let err = client.complete(request()).await.unwrap_err();

    assert!(matches!(err, CompletionError::BackendUnavailable(_)), "{err:?}");
    assert_eq!(mock.hits_async().await, 1);
    assert!(clock.sleeps().is_empty());
}
