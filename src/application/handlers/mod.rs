//! Application handlers.
//!
//! Command and query handlers that orchestrate the dispatcher and the
//! bookkeeping stores.

mod approve_mutation;
mod chat_turn;
mod list_pending;
mod reject_mutation;

pub use approve_mutation::{
    ApprovalCommandError, ApproveMutationCommand, ApproveMutationHandler, ApproveMutationResult,
};
pub use chat_turn::{ChatTurnCommand, ChatTurnError, ChatTurnHandler, ChatTurnResult};
pub use list_pending::ListPendingHandler;
pub use reject_mutation::{RejectMutationCommand, RejectMutationHandler};
