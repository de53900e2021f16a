//! Foundation module - Shared domain primitives.
//!
//! Identifiers and timestamps that form the vocabulary of the copilot domain.

mod ids;
mod timestamp;

pub use ids::{ApprovalId, ConversationId, InteractionId, ToolInvocationId};
pub use timestamp::Timestamp;
