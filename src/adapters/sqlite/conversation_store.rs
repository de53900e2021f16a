//! SQLite implementation of ConversationStore.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::foundation::{ConversationId, Timestamp};
use crate::ports::{ConversationError, ConversationStore, Message, MessageRole};

/// Message history in `chat_conversations` / `chat_messages`.
#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Creates a new SqliteConversationStore.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> ConversationError {
    ConversationError::Storage(e.to_string())
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn start(&self) -> Result<ConversationId, ConversationError> {
        let result = sqlx::query("INSERT INTO chat_conversations (created_at) VALUES (?)")
            .bind(Timestamp::now().as_datetime())
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(ConversationId::new(result.last_insert_rowid()))
    }

    async fn exists(&self, id: ConversationId) -> Result<bool, ConversationError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM chat_conversations WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(found.is_some())
    }

    async fn append(&self, id: ConversationId, message: &Message) -> Result<(), ConversationError> {
        if !self.exists(id).await? {
            return Err(ConversationError::NotFound(id));
        }

        sqlx::query(
            "INSERT INTO chat_messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_i64())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn recent(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, ConversationError> {
        let rows = sqlx::query(
            r#"
            SELECT role, content FROM (
                SELECT id, role, content FROM chat_messages
                WHERE conversation_id = ?
                ORDER BY id DESC
                LIMIT ?
            ) ORDER BY id ASC
            "#,
        )
        .bind(id.as_i64())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(storage)?;
                let role = MessageRole::parse(&role).ok_or_else(|| {
                    ConversationError::Storage(format!("unknown message role: {role}"))
                })?;
                let content: String = row.try_get("content").map_err(storage)?;
                Ok(Message::new(role, content))
            })
            .collect()
    }
}
