//! Wires `Settings` into a running `MentorService`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use config::Settings;
use llm::{ChatModel, GeminiProvider};
use mentor_core::{
    Clock, CompletionConfig, ConversationStore, MemoryConversationStore, MemoryResponseCache,
    MentorService, ResilientCompletionClient, RetryPolicy, SweepHandle, SystemClock,
};
use tracing::info;

use crate::AppState;

/// Application state plus the background tasks it owns
pub struct Services {
    pub state: AppState,
    pub sweeper: SweepHandle,
}

pub fn completion_config(settings: &Settings) -> CompletionConfig {
    CompletionConfig {
        retry: RetryPolicy::with_max_attempts(settings.max_attempts),
        cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
        coalesce_in_flight: settings.coalesce_in_flight,
    }
}

/// Build the Gemini-backed service. Must run inside a tokio runtime since it
/// starts the cache sweeper.
pub fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    let api_key = settings
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow!("GEMINI_API_KEY is not set"))?;
    let provider = GeminiProvider::new(
        &settings.gemini_base_url,
        api_key,
        Duration::from_secs(settings.backend_timeout_secs),
    )
    .context("failed to create Gemini provider")?;

    let chat_model: Arc<dyn ChatModel + Send + Sync> =
        Arc::new(provider.create_chat_model(&settings.chat_model));
    let finder_model: Arc<dyn ChatModel + Send + Sync> =
        Arc::new(provider.create_chat_model(&settings.file_finder_model));

    let store = open_store(settings)?;
    Ok(assemble(settings, chat_model, finder_model, store, Arc::new(SystemClock)))
}

/// Assemble the service around arbitrary models and a store
pub fn assemble(
    settings: &Settings,
    chat_model: Arc<dyn ChatModel + Send + Sync>,
    finder_model: Arc<dyn ChatModel + Send + Sync>,
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
) -> Services {
    let cache = Arc::new(MemoryResponseCache::new(clock.clone()));
    let sweeper = cache.start_sweeper(Duration::from_secs(settings.sweep_interval_secs.max(1)));

    let config = completion_config(settings);
    let chat = ResilientCompletionClient::new(chat_model, cache.clone(), clock.clone(), config.clone());
    let file_finder = ResilientCompletionClient::new(finder_model, cache, clock.clone(), config);
    info!(
        chat_model = chat.model_name(),
        file_finder_model = file_finder.model_name(),
        max_attempts = settings.max_attempts,
        "mentor service ready"
    );

    let mentor = MentorService::new(chat, file_finder, store, clock);
    Services {
        state: AppState {
            mentor: Arc::new(mentor),
            secure_cookies: settings.secure_cookies,
        },
        sweeper,
    }
}

#[cfg(feature = "sqlite")]
fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ConversationStore>> {
    match &settings.database_path {
        Some(path) => {
            info!(path = %path.display(), "using sqlite conversation store");
            let store = mentor_core::SqliteConversationStore::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryConversationStore::new())),
    }
}

#[cfg(not(feature = "sqlite"))]
fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ConversationStore>> {
    if let Some(path) = &settings.database_path {
        tracing::warn!(
            path = %path.display(),
            "database_path is set but sqlite support is not compiled in; using memory store"
        );
    }
    Ok(Arc::new(MemoryConversationStore::new()))
}
