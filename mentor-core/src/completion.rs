//! Resilient completion client
//!
//! `ResilientCompletionClient::complete` puts a response cache in front of a
//! `ChatModel` and retries throttled calls, honouring the backend's own
//! retry advisories. Only the terminal outcome leaves this module; callers
//! never see individual attempts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use llm::{ChatMessage, ChatModel, ChatRequest};
use tracing::{debug, info, warn};

use crate::cache::{ResponseCache, fingerprint};
use crate::classify::{Failure, classify};
use crate::clock::Clock;
use crate::error::CompletionError;
use crate::retry::RetryPolicy;
use crate::storage::{ConversationTurn, TopicId};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    /// Let concurrent identical requests share a single backend call
    pub coalesce_in_flight: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            coalesce_in_flight: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub topic_id: TopicId,
    pub prompt: String,
    /// Earlier turns, oldest first. Not part of the cache key.
    pub history: Vec<ConversationTurn>,
    pub system_instruction: Option<String>,
}

impl CompletionRequest {
    pub fn new(topic_id: TopicId, prompt: impl Into<String>) -> Self {
        Self {
            topic_id,
            prompt: prompt.into(),
            history: Vec::new(),
            system_instruction: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    fn fingerprint(&self) -> String {
        fingerprint(self.topic_id.as_str(), &self.prompt)
    }

    /// History in order, then the prompt as the final user turn
    fn to_chat_request(&self) -> ChatRequest {
        let mut messages: Vec<ChatMessage> = self.history.iter().map(ChatMessage::from).collect();
        messages.push(ChatMessage::user(self.prompt.clone()));

        let request = ChatRequest::new(messages);
        match &self.system_instruction {
            Some(instruction) => request.with_system_instruction(instruction.clone()),
            None => request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub text: String,
    /// Served from the response cache without calling the backend
    pub cached: bool,
}

type SharedCompletion = Shared<BoxFuture<'static, Result<CompletionResult, CompletionError>>>;

struct Inner {
    model: Arc<dyn ChatModel + Send + Sync>,
    cache: Arc<dyn ResponseCache>,
    clock: Arc<dyn Clock>,
    config: CompletionConfig,
    in_flight: Mutex<HashMap<String, SharedCompletion>>,
}

/// Cheap to clone; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct ResilientCompletionClient {
    inner: Arc<Inner>,
}

impl ResilientCompletionClient {
    pub fn new(
        model: Arc<dyn ChatModel + Send + Sync>,
        cache: Arc<dyn ResponseCache>,
        clock: Arc<dyn Clock>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                model,
                cache,
                clock,
                config,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn model_name(&self) -> &str {
        self.inner.model.name()
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.inner.config
    }

    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        if request.prompt.trim().is_empty() {
            return Err(CompletionError::InvalidRequest("prompt is empty".to_string()));
        }

        let key = request.fingerprint();
        match self.inner.cache.get(&key).await {
            Ok(Some(text)) => {
                debug!(topic = %request.topic_id, "completion served from cache");
                return Ok(CompletionResult { text, cached: true });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache lookup failed, treating as miss"),
        }

        if !self.inner.config.coalesce_in_flight {
            return self.inner.clone().fetch(key, request).await;
        }
        self.join_or_start(key, request).await
    }

    async fn join_or_start(
        &self,
        key: String,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        let shared = {
            let mut in_flight = match self.inner.in_flight.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(topic = %request.topic_id, "joining in-flight completion");
                    existing.clone()
                }
                None => {
                    // Spawned so the call finishes and leaves the table even
                    // when every waiter is dropped.
                    let inner = self.inner.clone();
                    let owned_key = key.clone();
                    let task = tokio::spawn(async move {
                        let _guard = InFlightGuard {
                            inner: inner.clone(),
                            key: owned_key.clone(),
                        };
                        inner.fetch(owned_key, request).await
                    });
                    let fut = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(CompletionError::BackendUnavailable(format!(
                                "completion task failed: {e}"
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, fut.clone());
                    fut
                }
            }
        };
        shared.await
    }
}

/// Removes an in-flight entry once its task ends, panics included
struct InFlightGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.finish_in_flight(&self.key);
    }
}

impl Inner {
    /// Backend call with retries, then cache write on success
    async fn fetch(
        self: Arc<Self>,
        key: String,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        let chat_request = request.to_chat_request();
        let text = self.call_with_retry(&chat_request).await?;

        if let Err(e) = self
            .cache
            .set(&key, text.clone(), self.config.cache_ttl)
            .await
        {
            warn!(error = %e, "cache write failed, result not cached");
        }

        Ok(CompletionResult {
            text,
            cached: false,
        })
    }

    async fn call_with_retry(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;

        while attempt < policy.max_attempts {
            attempt += 1;
            let error = match self.model.chat(request).await {
                Ok(message) => {
                    if attempt > 1 {
                        info!(attempt, model = self.model.name(), "completion succeeded after retry");
                    }
                    return Ok(message.content);
                }
                Err(e) => e,
            };

            let last_attempt = attempt >= policy.max_attempts;
            let delay = match classify(&error) {
                Failure::RetryAfter { seconds } if last_attempt => {
                    warn!(attempt, retry_after_secs = seconds, error = %error, "rate limited on final attempt");
                    return Err(CompletionError::RateLimited {
                        retry_after_secs: Some(seconds),
                    });
                }
                Failure::RetryAfter { seconds } => policy.retry_after_delay(seconds),
                Failure::RateLimited if last_attempt => {
                    warn!(attempt, error = %error, "rate limited on final attempt");
                    return Err(CompletionError::RateLimited {
                        retry_after_secs: None,
                    });
                }
                Failure::RateLimited => policy.backoff(attempt, policy.random_jitter()),
                Failure::Fatal => {
                    warn!(attempt, error = %error, "completion failed, not retrying");
                    return Err(CompletionError::BackendUnavailable(error.to_string()));
                }
            };

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "completion throttled, retrying"
            );
            self.clock.sleep(delay).await;
        }

        Err(CompletionError::Exhausted { attempts: attempt })
    }

    fn finish_in_flight(&self, key: &str) {
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.remove(key);
    }
}
