//! Interaction entity - one user turn as written to the audit log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ConversationId, InteractionId, Timestamp};
use crate::domain::routing::BusinessDomain;

/// Whether the turn produced a normal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionOutcome {
    Completed,
    /// A mutation was held for approval instead of being committed.
    PendingApproval,
    Failed,
}

impl InteractionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionOutcome::Completed => "completed",
            InteractionOutcome::PendingApproval => "pending_approval",
            InteractionOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for InteractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(InteractionOutcome::Completed),
            "pending_approval" => Ok(InteractionOutcome::PendingApproval),
            "failed" => Ok(InteractionOutcome::Failed),
            other => Err(format!("unknown interaction outcome: {other}")),
        }
    }
}

/// A single user turn. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaction {
    id: InteractionId,
    conversation_id: Option<ConversationId>,
    input_text: String,
    domain: Option<BusinessDomain>,
    action: Option<String>,
    response: String,
    outcome: InteractionOutcome,
    created_at: Timestamp,
}

impl Interaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: InteractionId,
        conversation_id: Option<ConversationId>,
        input_text: impl Into<String>,
        domain: Option<BusinessDomain>,
        action: Option<String>,
        response: impl Into<String>,
        outcome: InteractionOutcome,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id,
            input_text: input_text.into(),
            domain,
            action,
            response: response.into(),
            outcome,
            created_at,
        }
    }

    pub fn id(&self) -> InteractionId {
        self.id
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn domain(&self) -> Option<BusinessDomain> {
        self.domain
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn outcome(&self) -> InteractionOutcome {
        self.outcome
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }
}
