//! HTTP routes for the chat and approval endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{approve, chat, list_pending, reject, CopilotHandlers};

/// Creates the copilot router.
///
/// # Routes
/// - `POST /chat` - One chat turn
/// - `GET /approvals/pending` - Mutations awaiting approval
/// - `POST /approvals/:id/approve` - Commit a held mutation
/// - `POST /approvals/:id/reject` - Close a held mutation without writing
pub fn copilot_routes(handlers: CopilotHandlers) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/approvals/pending", get(list_pending))
        .route("/approvals/:id/approve", post(approve))
        .route("/approvals/:id/reject", post(reject))
        .with_state(handlers)
}
