//! SQLite-backed conversation memory

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Conversation, ConversationHistory, Message, Role};

/// Connection shared with blocking tasks
struct StoreInner {
    conn: Mutex<Connection>,
}

/// Conversations and their messages
///
/// Queries run on the blocking pool, never on a runtime worker.
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

impl ConversationStore {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let inner = StoreInner {
            conn: Mutex::new(conn),
        };
        inner.migrate()?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Run a blocking store operation off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreInner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Cheap round trip used by the health endpoint
    pub async fn check_connection(&self) -> Result<()> {
        self.blocking(|inner| inner.ping()).await
    }

    pub async fn create_conversation(&self) -> Result<Conversation> {
        let conversation = self.blocking(|inner| inner.create_conversation()).await?;
        tracing::info!("Created conversation: {}", conversation.conversation_id);
        Ok(conversation)
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let id = conversation_id.to_string();
        self.blocking(move |inner| inner.get_conversation(&id)).await
    }

    /// Append a message and bump the conversation's `updated_at`
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message> {
        let id = conversation_id.to_string();
        let content = content.to_string();
        let message = self
            .blocking(move |inner| inner.add_message(id, role, content, metadata))
            .await?;
        tracing::debug!("Added {} message to conversation: {}", role, conversation_id);
        Ok(message)
    }

    /// Conversation with its messages oldest first; `limit` keeps the most recent ones
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Option<ConversationHistory>> {
        let id = conversation_id.to_string();
        self.blocking(move |inner| {
            let Some(conversation) = inner.get_conversation(&id)? else {
                return Ok(None);
            };
            let messages = inner.load_messages(&id, limit)?;

            Ok(Some(ConversationHistory {
                conversation_id: conversation.conversation_id,
                messages,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
            }))
        })
        .await
    }

    /// Last `n` messages, oldest first; empty for unknown conversations
    pub async fn get_recent_messages(&self, conversation_id: &str, n: usize) -> Result<Vec<Message>> {
        let id = conversation_id.to_string();
        self.blocking(move |inner| inner.load_messages(&id, Some(n))).await
    }

    pub async fn message_count(&self, conversation_id: &str) -> Result<usize> {
        let id = conversation_id.to_string();
        self.blocking(move |inner| inner.message_count(&id)).await
    }
}

impl StoreInner {
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                conversation_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, id);
        "#,
        )?;

        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn create_conversation(&self) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            conversation_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversations (conversation_id, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![conversation.conversation_id, now, now],
        )?;
        Ok(conversation)
    }

    fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.lock();
        let conversation = conn
            .query_row(
                "SELECT conversation_id, created_at, updated_at FROM conversations WHERE conversation_id = ?1",
                params![conversation_id],
                |row| {
                    Ok(Conversation {
                        conversation_id: row.get(0)?,
                        created_at: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(conversation)
    }

    fn add_message(
        &self,
        conversation_id: String,
        role: Role,
        content: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message> {
        let now = Utc::now();
        let metadata_json = metadata.as_ref().map(serde_json::to_string).transpose()?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE conversation_id = ?2",
            params![now, conversation_id],
        )?;
        if updated == 0 {
            return Err(Error::ConversationNotFound(conversation_id));
        }
        tx.execute(
            "INSERT INTO messages (conversation_id, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![conversation_id, role.as_str(), content, metadata_json, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Message {
            id,
            conversation_id,
            role,
            content,
            metadata,
            created_at: now,
        })
    }

    fn message_count(&self, conversation_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn load_messages(&self, conversation_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|n| n as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, metadata, created_at FROM (
                 SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let metadata: Option<String> = row.get(4)?;
    let created_at: DateTime<Utc> = row.get(5)?;

    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        metadata,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_add() {
        let store = ConversationStore::in_memory().unwrap();
        store.check_connection().await.unwrap();

        let conv = store.create_conversation().await.unwrap();
        assert_eq!(store.message_count(&conv.conversation_id).await.unwrap(), 0);

        store
            .add_message(&conv.conversation_id, Role::User, "Hello", None)
            .await
            .unwrap();
        let reply = store
            .add_message(
                &conv.conversation_id,
                Role::Assistant,
                "Hi there",
                Some(json!({"citations": []})),
            )
            .await
            .unwrap();
        assert!(reply.id > 0);

        let history = store
            .get_conversation_history(&conv.conversation_id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].role, Role::User);
        assert_eq!(history.messages[1].metadata, Some(json!({"citations": []})));
        assert!(history.updated_at >= conv.updated_at);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let store = ConversationStore::in_memory().unwrap();
        let err = store
            .add_message("missing", Role::User, "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConversationNotFound(_)));
        assert!(store
            .get_conversation_history("missing", None)
            .await
            .unwrap()
            .is_none());
        assert!(store.get_recent_messages("missing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_messages_are_latest_oldest_first() {
        let store = ConversationStore::in_memory().unwrap();
        let conv = store.create_conversation().await.unwrap();
        for i in 0..6 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .add_message(&conv.conversation_id, role, &format!("m{}", i), None)
                .await
                .unwrap();
        }

        let recent = store
            .get_recent_messages(&conv.conversation_id, 3)
            .await
            .unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);

        let limited = store
            .get_conversation_history(&conv.conversation_id, Some(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(limited.messages.len(), 2);
        assert_eq!(limited.messages[1].content, "m5");
        assert_eq!(store.message_count(&conv.conversation_id).await.unwrap(), 6);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_queries_leave_runtime_responsive() {
        let store = Arc::new(ConversationStore::in_memory().unwrap());
        let conv = store.create_conversation().await.unwrap();

        // Hold the connection so every query has to wait for it
        let guard = store.inner.conn.lock();
        let pending = {
            let store = Arc::clone(&store);
            let id = conv.conversation_id.clone();
            tokio::spawn(async move { store.add_message(&id, Role::User, "queued", None).await })
        };
        // The single runtime thread is still free to run other tasks
        tokio::task::yield_now().await;
        let ticked = tokio::spawn(async { 1 + 1 }).await.unwrap();
        assert_eq!(ticked, 2);
        assert!(!pending.is_finished());
        drop(guard);

        pending.await.unwrap().unwrap();
        assert_eq!(store.message_count(&conv.conversation_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_errors() {
        let store = ConversationStore::in_memory().unwrap();
        let conv = store.create_conversation().await.unwrap();
        store
            .add_message(&conv.conversation_id, Role::User, "fine", None)
            .await
            .unwrap();

        store
            .inner
            .conn
            .lock()
            .execute("UPDATE messages SET role = 'robot'", [])
            .unwrap();
        let err = store
            .get_recent_messages(&conv.conversation_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)), "{:?}", err);

        store
            .inner
            .conn
            .lock()
            .execute("UPDATE messages SET role = 'user', metadata = '{not json'", [])
            .unwrap();
        let err = store
            .get_conversation_history(&conv.conversation_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");

        let id = {
            let store = ConversationStore::open(&path).unwrap();
            let conv = store.create_conversation().await.unwrap();
            store
                .add_message(&conv.conversation_id, Role::User, "kept", None)
                .await
                .unwrap();
            conv.conversation_id
        };

        let store = ConversationStore::open(&path).unwrap();
        assert_eq!(
            store.get_recent_messages(&id, 10).await.unwrap()[0].content,
            "kept"
        );
    }
}
