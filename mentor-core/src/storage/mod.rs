//! Conversation persistence
//!
//! Chat turns are stored per (session, topic) pair and read back in the
//! order they were written. Two backends are provided:
//! - `MemoryConversationStore` - process-local, used by default and in tests
//! - `SqliteConversationStore` - file-backed, behind the `sqlite` feature

mod ids;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use ids::{SessionId, TopicId};
pub use memory::MemoryConversationStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConversationStore;
pub use types::{ConversationTurn, TurnRole};

/// Append-only store of conversation turns
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist a turn at the end of the (session, topic) conversation
    async fn append(
        &self,
        session_id: &SessionId,
        topic_id: &TopicId,
        turn: &ConversationTurn,
    ) -> Result<()>;

    /// All turns of a conversation, oldest first. Turns sharing a
    /// timestamp come back in the order they were appended.
    async fn list(&self, session_id: &SessionId, topic_id: &TopicId)
    -> Result<Vec<ConversationTurn>>;
}
