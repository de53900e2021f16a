//! ChatTurnHandler - one user message in a conversation.
//!
//! Starts a conversation when none is given, feeds the recent history to
//! the dispatcher, and appends both sides of the exchange.

use std::sync::Arc;
use thiserror::Error;

use crate::application::dispatcher::{Dispatcher, TurnOutcome};
use crate::application::pipeline::TurnInput;
use crate::domain::foundation::ConversationId;
use crate::ports::{ConversationError, ConversationStore, Message};

/// Command to handle one chat message.
#[derive(Debug, Clone)]
pub struct ChatTurnCommand {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub requested_by: String,
}

impl ChatTurnCommand {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            requested_by: "anonymous".to_string(),
        }
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

/// Result of a chat turn. The turn itself may have failed; see
/// [`TurnOutcome::error`].
#[derive(Debug, Clone)]
pub struct ChatTurnResult {
    pub conversation_id: ConversationId,
    pub turn: TurnOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatTurnError {
    #[error("Validation error: message cannot be empty")]
    EmptyMessage,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Conversation storage error: {0}")]
    Storage(String),
}

impl From<ConversationError> for ChatTurnError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(id) => ChatTurnError::ConversationNotFound(id),
            ConversationError::Storage(e) => ChatTurnError::Storage(e),
        }
    }
}

pub struct ChatTurnHandler {
    dispatcher: Arc<Dispatcher>,
    conversations: Arc<dyn ConversationStore>,
    history_window: usize,
}

impl ChatTurnHandler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        conversations: Arc<dyn ConversationStore>,
        history_window: usize,
    ) -> Self {
        Self {
            dispatcher,
            conversations,
            history_window,
        }
    }

    pub async fn handle(&self, cmd: ChatTurnCommand) -> Result<ChatTurnResult, ChatTurnError> {
        let message = cmd.message.trim();
        if message.is_empty() {
            return Err(ChatTurnError::EmptyMessage);
        }

        // 1. Resolve the conversation
        let conversation_id = match cmd.conversation_id {
            Some(id) if self.conversations.exists(id).await? => id,
            Some(id) => return Err(ChatTurnError::ConversationNotFound(id)),
            None => self.conversations.start().await?,
        };

        // 2. Dispatch with recent history
        let history = self
            .conversations
            .recent(conversation_id, self.history_window)
            .await?;
        let input = TurnInput::new(message)
            .with_history(history)
            .with_requested_by(cmd.requested_by);
        let turn = self.dispatcher.dispatch(&input, Some(conversation_id)).await;

        // 3. Remember the exchange
        for entry in [Message::user(message), Message::assistant(turn.response.clone())] {
            if let Err(e) = self.conversations.append(conversation_id, &entry).await {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "failed to store chat message");
            }
        }

        Ok(ChatTurnResult {
            conversation_id,
            turn,
        })
    }
}
