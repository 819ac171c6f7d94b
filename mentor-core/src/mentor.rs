//! Mentor workflows: one-shot hints, persisted chat and file prediction.
//!
//! Each workflow builds its prompt, hands it to a `ResilientCompletionClient`
//! and, for chat, records both sides of the exchange. The user turn is
//! written before the backend is called so it survives a failed completion.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::completion::{CompletionRequest, CompletionResult, ResilientCompletionClient};
use crate::error::MentorError;
use crate::prompts;
use crate::storage::{ConversationStore, ConversationTurn, SessionId, TopicId};

/// A chat message from the browser
#[derive(Debug, Clone, Default)]
pub struct ChatSend {
    pub prompt: String,
    /// Conversation to append to; the general topic when absent
    pub topic_id: Option<TopicId>,
    pub issue: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub message: ConversationTurn,
    pub cached: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FileFinderRequest {
    pub issue_title: String,
    pub issue_body: String,
    pub owner: String,
    pub repo: String,
    /// Every path in the repository, unfiltered
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSuggestion {
    pub path: String,
    pub cached: bool,
}

pub struct MentorService {
    chat: ResilientCompletionClient,
    file_finder: ResilientCompletionClient,
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
}

impl MentorService {
    /// `file_finder` may wrap a different model than `chat`
    pub fn new(
        chat: ResilientCompletionClient,
        file_finder: ResilientCompletionClient,
        store: Arc<dyn ConversationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chat,
            file_finder,
            store,
            clock,
        }
    }

    /// Single hint about `issue` given the developer's `code`. Nothing is
    /// persisted.
    pub async fn hint(
        &self,
        issue: &str,
        code: &str,
        user_message: &str,
    ) -> Result<CompletionResult, MentorError> {
        if [issue, code, user_message].iter().any(|s| s.trim().is_empty()) {
            return Err(MentorError::InvalidInput(
                "issue, code and userMessage are required".to_string(),
            ));
        }

        let prompt = prompts::mentor_hint_prompt(issue, code, user_message)?;
        let request = CompletionRequest::new(TopicId::from_string(issue), prompt)
            .with_system_instruction(prompts::MENTOR_SYSTEM_PROMPT);
        Ok(self.chat.complete(request).await?)
    }

    pub async fn send_chat(
        &self,
        session_id: &SessionId,
        message: ChatSend,
    ) -> Result<ChatReply, MentorError> {
        if message.prompt.trim().is_empty() {
            return Err(MentorError::InvalidInput("prompt is required".to_string()));
        }
        let topic_id = message.topic_id.unwrap_or_else(TopicId::general);

        let history = self
            .store
            .list(session_id, &topic_id)
            .await
            .map_err(MentorError::Storage)?;

        let user_turn = ConversationTurn::user(message.prompt.clone(), self.clock.now());
        self.store
            .append(session_id, &topic_id, &user_turn)
            .await
            .map_err(MentorError::Storage)?;

        let system_instruction =
            prompts::chat_system_instruction(message.issue.as_deref(), message.code.as_deref())?;
        let request = CompletionRequest::new(topic_id.clone(), message.prompt)
            .with_history(history)
            .with_system_instruction(system_instruction);
        let result = self.chat.complete(request).await?;

        let reply = ConversationTurn::assistant(result.text, self.clock.now());
        self.store
            .append(session_id, &topic_id, &reply)
            .await
            .map_err(MentorError::Storage)?;
        debug!(session = %session_id, topic = %topic_id, cached = result.cached, "chat turn stored");

        Ok(ChatReply {
            message: reply,
            cached: result.cached,
        })
    }

    /// Stored conversation for a topic; empty when no topic is given
    pub async fn history(
        &self,
        session_id: &SessionId,
        topic_id: Option<&TopicId>,
    ) -> Result<Vec<ConversationTurn>, MentorError> {
        let Some(topic_id) = topic_id else {
            return Ok(Vec::new());
        };
        self.store
            .list(session_id, topic_id)
            .await
            .map_err(MentorError::Storage)
    }

    /// Predict the single repository file most likely to need changing
    pub async fn suggest_file(
        &self,
        request: FileFinderRequest,
    ) -> Result<FileSuggestion, MentorError> {
        if request.owner.trim().is_empty() || request.repo.trim().is_empty() {
            return Err(MentorError::InvalidInput("Missing owner/repo".to_string()));
        }

        let files = prompts::filter_repository_files(&request.files);
        let prompt = prompts::file_finder_prompt(
            &request.owner,
            &request.repo,
            &request.issue_title,
            &request.issue_body,
            &files,
        )?;
        let topic_id = TopicId::from_string(format!("{}/{}", request.owner, request.repo));
        let result = self
            .file_finder
            .complete(CompletionRequest::new(topic_id, prompt))
            .await?;

        let path = prompts::clean_predicted_path(&result.text);
        if path.is_empty() {
            return Err(MentorError::EmptyPrediction);
        }
        info!(
            repo = %format!("{}/{}", request.owner, request.repo),
            path = %path,
            candidates = files.len(),
            "predicted file"
        );
        Ok(FileSuggestion {
            path,
            cached: result.cached,
        })
    }
}
