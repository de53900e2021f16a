//! HTTP handlers for the chat and approval endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{
    ApprovalCommandError, ApproveMutationCommand, ApproveMutationHandler, ChatTurnCommand,
    ChatTurnError, ChatTurnHandler, ListPendingHandler, RejectMutationCommand,
    RejectMutationHandler,
};
use crate::domain::foundation::ApprovalId;

use super::dto::{
    ChatRequest, ChatResponse, DecisionRequest, DecisionResponse, ErrorResponse,
    PendingListResponse,
};

const DEFAULT_DECIDER: &str = "reviewer";

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct CopilotHandlers {
    chat_handler: Arc<ChatTurnHandler>,
    approve_handler: Arc<ApproveMutationHandler>,
    reject_handler: Arc<RejectMutationHandler>,
    pending_handler: Arc<ListPendingHandler>,
}

impl CopilotHandlers {
    pub fn new(
        chat_handler: Arc<ChatTurnHandler>,
        approve_handler: Arc<ApproveMutationHandler>,
        reject_handler: Arc<RejectMutationHandler>,
        pending_handler: Arc<ListPendingHandler>,
    ) -> Self {
        Self {
            chat_handler,
            approve_handler,
            reject_handler,
            pending_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /chat - One user message.
///
/// Failed turns still answer 200 with the failure description, except when
/// the reasoning service is unavailable.
pub async fn chat(State(handlers): State<CopilotHandlers>, Json(req): Json<ChatRequest>) -> Response {
    let mut cmd = ChatTurnCommand::new(req.message);
    cmd.conversation_id = req.conversation_id;
    if let Some(requested_by) = req.requested_by {
        cmd.requested_by = requested_by;
    }

    match handlers.chat_handler.handle(cmd).await {
        Ok(result) if result.turn.error.as_ref().is_some_and(|e| e.is_gateway_unavailable()) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("GATEWAY_UNAVAILABLE", result.turn.response)),
        )
            .into_response(),
        Ok(result) => (StatusCode::OK, Json(ChatResponse::from(result))).into_response(),
        Err(e) => handle_chat_error(e),
    }
}

/// GET /approvals/pending - The approval queue.
pub async fn list_pending(State(handlers): State<CopilotHandlers>) -> Response {
    match handlers.pending_handler.handle().await {
        Ok(requests) => {
            let response = PendingListResponse {
                items: requests.into_iter().map(Into::into).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_approval_error(e),
    }
}

/// POST /approvals/:id/approve - Commit a held mutation.
pub async fn approve(
    State(handlers): State<CopilotHandlers>,
    Path(approval_id): Path<String>,
    body: Option<Json<DecisionRequest>>,
) -> Response {
    let approval_id = match parse_approval_id(&approval_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let cmd = ApproveMutationCommand {
        approval_id,
        decided_by: decider(body),
    };

    match handlers.approve_handler.handle(cmd).await {
        Ok(result) => (StatusCode::OK, Json(DecisionResponse::from(result))).into_response(),
        Err(e) => handle_approval_error(e),
    }
}

/// POST /approvals/:id/reject - Close a held mutation without writing.
pub async fn reject(
    State(handlers): State<CopilotHandlers>,
    Path(approval_id): Path<String>,
    body: Option<Json<DecisionRequest>>,
) -> Response {
    let approval_id = match parse_approval_id(&approval_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let cmd = RejectMutationCommand {
        approval_id,
        decided_by: decider(body),
    };

    match handlers.reject_handler.handle(cmd).await {
        Ok(request) => {
            let response = DecisionResponse {
                message: format!("Request #{} was rejected; nothing was written.", request.id),
                request: request.into(),
                rows_affected: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_approval_error(e),
    }
}

fn parse_approval_id(raw: &str) -> Result<ApprovalId, Response> {
    raw.parse::<ApprovalId>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid approval request ID")),
        )
            .into_response()
    })
}

fn decider(body: Option<Json<DecisionRequest>>) -> String {
    body.and_then(|Json(req)| req.decided_by)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DECIDER.to_string())
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn handle_chat_error(error: ChatTurnError) -> Response {
    match error {
        ChatTurnError::EmptyMessage => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Message cannot be empty")),
        )
            .into_response(),
        ChatTurnError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Conversation", &id.to_string())),
        )
            .into_response(),
        ChatTurnError::Storage(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(msg)),
        )
            .into_response(),
    }
}

fn handle_approval_error(error: ApprovalCommandError) -> Response {
    let (status, code) = match &error {
        ApprovalCommandError::NotFound(id) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::not_found("Approval request", &id.to_string())),
            )
                .into_response()
        }
        ApprovalCommandError::AlreadyDecided { .. } => (StatusCode::CONFLICT, "CONFLICT"),
        ApprovalCommandError::Unsafe(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNSAFE_MUTATION"),
        ApprovalCommandError::Execution(_) | ApprovalCommandError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    (status, Json(ErrorResponse::new(code, error.to_string()))).into_response()
}
