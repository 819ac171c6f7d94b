use async_trait::async_trait;

pub mod api;
mod client;
pub mod error;
pub mod providers;
pub mod traffic_log;

pub use api::*;
pub use error::BackendError;
pub use providers::{GeminiChatModel, GeminiProvider};

#[async_trait]
pub trait ChatModel {
    fn name(&self) -> &str;

    /// Send the whole conversation and return the model's reply.
    ///
    /// Failures come back as raw `BackendError`s; deciding whether one is
    /// worth retrying is left to the caller.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatMessage, BackendError>;
}

