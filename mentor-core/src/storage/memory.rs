//! In-memory ConversationStore implementation

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::ConversationStore;
use super::ids::{SessionId, TopicId};
use super::types::ConversationTurn;

type ConversationKey = (SessionId, TopicId);

/// Process-local conversation store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<ConversationKey, Vec<ConversationTurn>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(
        &self,
        session_id: &SessionId,
        topic_id: &TopicId,
        turn: &ConversationTurn,
    ) -> Result<()> {
        let mut conversations = self
            .conversations
            .lock()
            .map_err(|_| anyhow!("conversation store lock poisoned"))?;
        conversations
            .entry((session_id.clone(), topic_id.clone()))
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn list(
        &self,
        session_id: &SessionId,
        topic_id: &TopicId,
    ) -> Result<Vec<ConversationTurn>> {
        let conversations = self
            .conversations
            .lock()
            .map_err(|_| anyhow!("conversation store lock poisoned"))?;
        let mut turns = conversations
            .get(&(session_id.clone(), topic_id.clone()))
            .cloned()
            .unwrap_or_default();
        // Stable sort keeps insertion order among equal timestamps
        turns.sort_by_key(|turn| turn.created_at);
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_conversations_are_scoped() {
        let store = MemoryConversationStore::new();
        let session = SessionId::from_string("s1");
        let other_session = SessionId::from_string("s2");
        let topic = TopicId::from_string("acme/repo#42");
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();

        store
            .append(&session, &topic, &ConversationTurn::user("hi", now))
            .await
            .unwrap();

        assert_eq!(store.list(&session, &topic).await.unwrap().len(), 1);
        assert!(store.list(&other_session, &topic).await.unwrap().is_empty());
        assert!(
            store
                .list(&session, &TopicId::general())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_list_orders_by_time_then_insertion() {
        let store = MemoryConversationStore::new();
        let session = SessionId::new();
        let topic = TopicId::general();
        let t0 = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();

        for turn in [
            ConversationTurn::assistant("later", t0 + Duration::seconds(5)),
            ConversationTurn::user("first", t0),
            ConversationTurn::assistant("second", t0),
        ] {
            store.append(&session, &topic, &turn).await.unwrap();
        }

        let contents: Vec<_> = store
            .list(&session, &topic)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "later"]);
    }
}
