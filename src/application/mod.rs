//! Application layer - turn orchestration and command handlers.
//!
//! The dispatcher routes a request to a domain pipeline; every reasoning
//! and data-store call of a turn goes through a [`TurnRecorder`] so it lands
//! in the audit trail. Handlers are the entry points used by the HTTP layer.

pub mod dispatcher;
pub mod gateway;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod recorder;

pub use dispatcher::{Dispatcher, TurnOutcome};
pub use gateway::{GatewaySettings, ReasoningGateway};
pub use handlers::{
    ApprovalCommandError, ApproveMutationCommand, ApproveMutationHandler, ApproveMutationResult,
    ChatTurnCommand, ChatTurnError, ChatTurnHandler, ChatTurnResult, ListPendingHandler,
    RejectMutationCommand, RejectMutationHandler,
};
pub use pipeline::{DomainPipeline, PipelineReply, TurnInput};
pub use recorder::TurnRecorder;
