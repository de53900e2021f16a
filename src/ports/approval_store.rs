//! Approval Store Port - persistence for mutations awaiting approval.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::approval::{ApprovalStatus, NewPendingMutation, PendingMutation, Submission};
use crate::domain::foundation::ApprovalId;

/// Port for pending-mutation persistence.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Store a request, or return the pending request with the same
    /// fingerprint if there is one.
    async fn submit(&self, request: NewPendingMutation) -> Result<Submission, ApprovalError>;

    /// Find a request by ID.
    async fn find(&self, id: ApprovalId) -> Result<Option<PendingMutation>, ApprovalError>;

    /// Every request still pending, oldest first.
    async fn list_pending(&self) -> Result<Vec<PendingMutation>, ApprovalError>;

    /// Move a pending request to `status`.
    ///
    /// Fails with [`ApprovalError::AlreadyDecided`] when the request has left
    /// the pending state, so a request is decided at most once.
    async fn decide(
        &self,
        id: ApprovalId,
        status: ApprovalStatus,
        decided_by: &str,
    ) -> Result<PendingMutation, ApprovalError>;
}

/// Approval store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("approval request {0} not found")]
    NotFound(ApprovalId),

    #[error("approval request {id} is already {status}")]
    AlreadyDecided { id: ApprovalId, status: ApprovalStatus },

    #[error("approval storage error: {0}")]
    Storage(String),
}
