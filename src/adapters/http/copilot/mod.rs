//! HTTP adapter for the chat and approval endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    ChatRequest, ChatResponse, DecisionRequest, DecisionResponse, ErrorResponse,
    PendingListResponse, PendingMutationResponse,
};
pub use handlers::CopilotHandlers;
pub use routes::copilot_routes;
