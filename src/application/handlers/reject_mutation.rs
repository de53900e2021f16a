//! RejectMutationHandler - Command handler for declining a held mutation.

use std::sync::Arc;

use crate::domain::approval::{ApprovalStatus, PendingMutation};
use crate::domain::foundation::ApprovalId;
use crate::ports::ApprovalStore;

use super::approve_mutation::{load_pending, ApprovalCommandError};

/// Command to reject a pending mutation. Nothing is written.
#[derive(Debug, Clone)]
pub struct RejectMutationCommand {
    pub approval_id: ApprovalId,
    pub decided_by: String,
}

pub struct RejectMutationHandler {
    approvals: Arc<dyn ApprovalStore>,
}

impl RejectMutationHandler {
    pub fn new(approvals: Arc<dyn ApprovalStore>) -> Self {
        Self { approvals }
    }

    pub async fn handle(
        &self,
        cmd: RejectMutationCommand,
    ) -> Result<PendingMutation, ApprovalCommandError> {
        load_pending(self.approvals.as_ref(), cmd.approval_id).await?;

        let request = self
            .approvals
            .decide(cmd.approval_id, ApprovalStatus::Rejected, &cmd.decided_by)
            .await?;

        tracing::info!(approval_id = %request.id, decided_by = %cmd.decided_by, "mutation rejected");
        Ok(request)
    }
}
