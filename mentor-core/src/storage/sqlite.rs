//! SQLite implementation of ConversationStore

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::ConversationStore;
use super::ids::{SessionId, TopicId};
use super::types::{ConversationTurn, TurnRole};

/// Conversation store backed by a single SQLite connection.
///
/// Timestamps are stored as unix milliseconds; rows are read back by
/// `created_at` with the autoincrement id breaking ties.
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                topic_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_turns_conversation
                ON chat_turns(session_id, topic_id, created_at);
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(
        &self,
        session_id: &SessionId,
        topic_id: &TopicId,
        turn: &ConversationTurn,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_turns (session_id, topic_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                topic_id,
                turn.role.as_str(),
                turn.content,
                turn.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    async fn list(
        &self,
        session_id: &SessionId,
        topic_id: &TopicId,
    ) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM chat_turns
             WHERE session_id = ?1 AND topic_id = ?2
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![session_id, topic_id], |row| {
            let role: String = row.get(0)?;
            let content: String = row.get(1)?;
            let created_at: i64 = row.get(2)?;
            Ok((role, content, created_at))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, created_at) = row?;
            let role: TurnRole = role.parse()?;
            let created_at = DateTime::<Utc>::from_timestamp_millis(created_at)
                .ok_or_else(|| anyhow!("invalid turn timestamp: {}", created_at))?;
            turns.push(ConversationTurn::new(role, content, created_at));
        }
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let session = SessionId::from_string("s1");
        let topic = TopicId::from_string("acme/repo#42");
        let t0 = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();

        store
            .append(&session, &topic, &ConversationTurn::assistant("later", t0 + Duration::seconds(1)))
            .await
            .unwrap();
        store
            .append(&session, &topic, &ConversationTurn::user("q", t0))
            .await
            .unwrap();
        store
            .append(&session, &topic, &ConversationTurn::assistant("a", t0))
            .await
            .unwrap();

        let turns = store.list(&session, &topic).await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q", "a", "later"]);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].created_at, t0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentor.db");
        let session = SessionId::new();
        let topic = TopicId::general();
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();

        {
            let store = SqliteConversationStore::open(&path).unwrap();
            store
                .append(&session, &topic, &ConversationTurn::user("remember me", now))
                .await
                .unwrap();
        }

        let store = SqliteConversationStore::open(&path).unwrap();
        let turns = store.list(&session, &topic).await.unwrap();
        assert_eq!(turns, vec![ConversationTurn::user("remember me", now)]);
        assert!(
            store
                .list(&SessionId::new(), &topic)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
