//! Interaction Log Port - append-only audit storage.
//!
//! Tool invocations are appended as each call returns; the interaction row
//! is appended once the turn has finished (successfully or not).
//!
//! # Example
//!
//! ```ignore
//! use async_trait::async_trait;
//!
//! struct SqliteInteractionLog { /* ... */ }
//!
//! #[async_trait]
//! impl InteractionLog for SqliteInteractionLog {
//!     async fn append_invocation(&self, invocation: &ToolInvocation) -> Result<(), AuditError> {
//!         // INSERT INTO audit_tool_invocations ...
//!     }
//!     // ... other methods
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audit::{Interaction, ToolInvocation};
use crate::domain::foundation::InteractionId;

/// Port for the durable audit trail.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    /// Append one tool invocation record.
    async fn append_invocation(&self, invocation: &ToolInvocation) -> Result<(), AuditError>;

    /// Append the record of a finished turn.
    async fn append_interaction(&self, interaction: &Interaction) -> Result<(), AuditError>;

    /// Find an interaction by ID.
    async fn find_interaction(
        &self,
        id: InteractionId,
    ) -> Result<Option<Interaction>, AuditError>;

    /// All invocations of an interaction, ordered by sequence number.
    async fn invocations_for(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Vec<ToolInvocation>, AuditError>;
}

/// Audit storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("corrupt audit record: {0}")]
    Corrupt(String),
}
