//! Conversation Store Port - message history per conversation.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::ConversationId;
use crate::ports::Message;

/// Port for conversation persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Allocate a new conversation.
    async fn start(&self) -> Result<ConversationId, ConversationError>;

    /// Whether the conversation exists.
    async fn exists(&self, id: ConversationId) -> Result<bool, ConversationError>;

    /// Append a message.
    async fn append(&self, id: ConversationId, message: &Message) -> Result<(), ConversationError>;

    /// The most recent `limit` messages, oldest first.
    async fn recent(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, ConversationError>;
}

/// Conversation store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("conversation {0} not found")]
    NotFound(ConversationId),

    #[error("conversation storage error: {0}")]
    Storage(String),
}
