//! ListPendingHandler - Query handler for the approval queue.

use std::sync::Arc;

use crate::domain::approval::PendingMutation;
use crate::ports::ApprovalStore;

use super::approve_mutation::ApprovalCommandError;

pub struct ListPendingHandler {
    approvals: Arc<dyn ApprovalStore>,
}

impl ListPendingHandler {
    pub fn new(approvals: Arc<dyn ApprovalStore>) -> Self {
        Self { approvals }
    }

    /// Pending requests, oldest first.
    pub async fn handle(&self) -> Result<Vec<PendingMutation>, ApprovalCommandError> {
        Ok(self.approvals.list_pending().await?)
    }
}
