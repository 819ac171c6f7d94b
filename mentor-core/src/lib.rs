//! Core of the issue mentor service
//!
//! This crate provides:
//! - **Completion**: `ResilientCompletionClient`, a cached and retrying wrapper
//!   around any `llm::ChatModel`
//! - **Cache**: `ResponseCache` trait with the expiring `MemoryResponseCache`
//! - **Storage**: `ConversationStore` trait with `MemoryConversationStore` and
//!   `SqliteConversationStore` backends
//! - **Workflows**: `MentorService` for hints, chat and file prediction
//!
//! # Example
//!
//! ```ignore
//! use mentor_core::{CompletionRequest, ResilientCompletionClient, TopicId};
//!
//! let client = ResilientCompletionClient::new(model, cache, clock, Default::default());
//! let result = client
//!     .complete(CompletionRequest::new(TopicId::from_string("acme/repo#42"), "fix tax bug"))
//!     .await?;
//! ```
pub mod cache;
pub mod classify;
pub mod clock;
pub mod completion;
pub mod error;
pub mod mentor;
pub mod prompts;
pub mod retry;
pub mod storage;

pub use cache::{MemoryResponseCache, ResponseCache, SweepHandle, fingerprint};
pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{
    CompletionConfig, CompletionRequest, CompletionResult, ResilientCompletionClient,
};
pub use error::{CacheError, CompletionError, MentorError};
pub use mentor::{ChatReply, ChatSend, FileFinderRequest, FileSuggestion, MentorService};
pub use retry::RetryPolicy;
pub use storage::{ConversationStore, ConversationTurn, MemoryConversationStore, SessionId, TopicId, TurnRole};
#[cfg(feature = "sqlite")]
pub use storage::SqliteConversationStore;
