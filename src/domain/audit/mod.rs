//! Audit module - interactions and the tool invocations that make them up.

mod interaction;
mod tool_invocation;

pub use interaction::{Interaction, InteractionOutcome};
pub use tool_invocation::{ToolInvocation, ToolName};
