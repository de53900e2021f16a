//! HTTP DTOs for the chat and approval endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::{ApproveMutationResult, ChatTurnResult};
use crate::domain::approval::{ApprovalStatus, PendingMutation};
use crate::domain::foundation::ConversationId;
use crate::domain::routing::BusinessDomain;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to send one chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted to start a new conversation.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Body of an approve or reject call. Optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub decided_by: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub conversation_id: ConversationId,
    pub response: String,
    pub interaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<BusinessDomain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub outcome: String,
}

impl From<ChatTurnResult> for ChatResponse {
    fn from(result: ChatTurnResult) -> Self {
        Self {
            conversation_id: result.conversation_id,
            interaction_id: result.turn.interaction_id.to_string(),
            domain: result.turn.domain,
            action: result.turn.action,
            outcome: result.turn.outcome.as_str().to_string(),
            response: result.turn.response,
        }
    }
}

/// An approval request as shown to reviewers.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMutationResponse {
    pub id: i64,
    pub domain: BusinessDomain,
    pub action: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub threshold: f64,
    pub status: ApprovalStatus,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<String>,
}

impl From<PendingMutation> for PendingMutationResponse {
    fn from(request: PendingMutation) -> Self {
        Self {
            id: request.id.as_i64(),
            domain: request.domain,
            action: request.action,
            payload: request.payload,
            amount: request.amount,
            threshold: request.threshold,
            status: request.status,
            requested_by: request.requested_by,
            decided_by: request.decided_by,
            created_at: request.created_at.to_rfc3339(),
            decided_at: request.decided_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingListResponse {
    pub items: Vec<PendingMutationResponse>,
}

/// Outcome of an approve or reject call.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub request: PendingMutationResponse,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl From<ApproveMutationResult> for DecisionResponse {
    fn from(result: ApproveMutationResult) -> Self {
        Self {
            request: result.request.into(),
            message: result.response,
            rows_affected: Some(result.rows_affected),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found: {}", resource_type, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
