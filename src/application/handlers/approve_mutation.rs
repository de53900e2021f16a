//! ApproveMutationHandler - the only path that commits a mutation held for
//! approval.
//!
//! The stored payload is rebuilt into a plan and passes the domain's
//! statement guard again before anything is written. The request is moved
//! out of `pending` before the write, so it commits at most once. The commit
//! is recorded as its own interaction.

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::application::recorder::TurnRecorder;
use crate::domain::approval::{ApprovalStatus, PendingMutation};
use crate::domain::audit::{Interaction, InteractionOutcome, ToolName};
use crate::domain::foundation::{ApprovalId, InteractionId, Timestamp};
use crate::domain::formatting::format_write;
use crate::domain::mutation::MutationPlan;
use crate::domain::query::WriteOutcome;
use crate::domain::routing::{ActionKind, DomainCatalog};
use crate::ports::{ApprovalError, ApprovalStore, InteractionLog, QueryExecutor};

/// Command to approve and commit a pending mutation.
#[derive(Debug, Clone)]
pub struct ApproveMutationCommand {
    pub approval_id: ApprovalId,
    pub decided_by: String,
}

/// Result of a committed approval.
#[derive(Debug, Clone)]
pub struct ApproveMutationResult {
    pub request: PendingMutation,
    pub interaction_id: InteractionId,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
    pub response: String,
}

/// Errors of the approval commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApprovalCommandError {
    #[error("Approval request {0} not found")]
    NotFound(ApprovalId),

    #[error("Approval request {id} is already {status}")]
    AlreadyDecided { id: ApprovalId, status: ApprovalStatus },

    #[error("The stored mutation was rejected: {0}")]
    Unsafe(String),

    #[error("The data store rejected the mutation: {0}")]
    Execution(String),

    #[error("Approval storage error: {0}")]
    Storage(String),
}

impl From<ApprovalError> for ApprovalCommandError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::NotFound(id) => ApprovalCommandError::NotFound(id),
            ApprovalError::AlreadyDecided { id, status } => {
                ApprovalCommandError::AlreadyDecided { id, status }
            }
            ApprovalError::Storage(e) => ApprovalCommandError::Storage(e),
        }
    }
}

/// Loads a request and refuses it unless it is still pending.
pub(crate) async fn load_pending(
    approvals: &dyn ApprovalStore,
    id: ApprovalId,
) -> Result<PendingMutation, ApprovalCommandError> {
    let request = approvals
        .find(id)
        .await?
        .ok_or(ApprovalCommandError::NotFound(id))?;
    if !request.is_pending() {
        return Err(ApprovalCommandError::AlreadyDecided {
            id,
            status: request.status,
        });
    }
    Ok(request)
}

pub struct ApproveMutationHandler {
    approvals: Arc<dyn ApprovalStore>,
    executor: Arc<dyn QueryExecutor>,
    catalog: Arc<DomainCatalog>,
    log: Arc<dyn InteractionLog>,
}

impl ApproveMutationHandler {
    pub fn new(
        approvals: Arc<dyn ApprovalStore>,
        executor: Arc<dyn QueryExecutor>,
        catalog: Arc<DomainCatalog>,
        log: Arc<dyn InteractionLog>,
    ) -> Self {
        Self {
            approvals,
            executor,
            catalog,
            log,
        }
    }

    pub async fn handle(
        &self,
        cmd: ApproveMutationCommand,
    ) -> Result<ApproveMutationResult, ApprovalCommandError> {
        // 1. Load, still pending
        let request = load_pending(self.approvals.as_ref(), cmd.approval_id).await?;

        // 2. Rebuild the plan and re-run the guard
        let plan = self.plan_for(&request)?;

        // 3. Leave the pending state before writing
        let request = self
            .approvals
            .decide(cmd.approval_id, ApprovalStatus::Approved, &cmd.decided_by)
            .await?;

        // 4. Commit, recorded as its own interaction
        let interaction_id = InteractionId::new();
        let recorder = TurnRecorder::new(self.log.clone(), interaction_id);
        recorder.set_action(&request.action);
        let written = recorder
            .record(
                ToolName::SqlWrite,
                json!({
                    "statement": plan.statement(),
                    "params": request.payload["values"],
                    "approval_id": request.id.as_i64(),
                }),
                self.executor.write(&plan.statement(), plan.params()),
                |o: &WriteOutcome| {
                    json!({
                        "rows_affected": o.rows_affected,
                        "last_insert_id": o.last_insert_id,
                    })
                },
            )
            .await
            .map_err(|e| ApprovalCommandError::Execution(e.to_string()));

        let (response, outcome) = match &written {
            Ok(o) => (
                format_write(plan.table(), o.rows_affected, o.last_insert_id),
                InteractionOutcome::Completed,
            ),
            Err(e) => (e.to_string(), InteractionOutcome::Failed),
        };
        let interaction = Interaction::new(
            interaction_id,
            None,
            format!("approve request #{} by {}", request.id, cmd.decided_by),
            Some(request.domain),
            Some(request.action.clone()),
            response.clone(),
            outcome,
            Timestamp::now(),
        );
        if let Err(e) = self.log.append_interaction(&interaction).await {
            tracing::error!(
                approval_id = %request.id,
                error = %e,
                "approval commit missing from audit trail"
            );
        }

        let written = written.map_err(|e| {
            tracing::error!(
                approval_id = %request.id,
                error = %e,
                "approved mutation failed to commit"
            );
            e
        })?;
        tracing::info!(
            approval_id = %request.id,
            decided_by = %cmd.decided_by,
            "approved mutation committed"
        );

        Ok(ApproveMutationResult {
            request,
            interaction_id,
            rows_affected: written.rows_affected,
            last_insert_id: written.last_insert_id,
            response,
        })
    }

    fn plan_for(&self, request: &PendingMutation) -> Result<MutationPlan, ApprovalCommandError> {
        let config = self.catalog.get(request.domain).ok_or_else(|| {
            ApprovalCommandError::Unsafe(format!("no configuration for domain {}", request.domain))
        })?;
        let action = config
            .action(&request.action)
            .filter(|a| a.kind() == ActionKind::Create)
            .ok_or_else(|| {
                ApprovalCommandError::Unsafe(format!("{} is not a create action", request.action))
            })?;

        let plan = MutationPlan::from_payload(&request.payload, config.schema())
            .map_err(|e| ApprovalCommandError::Unsafe(e.to_string()))?;

        let target = action.target_table().unwrap_or_default();
        if !plan.table().eq_ignore_ascii_case(target) {
            return Err(ApprovalCommandError::Unsafe(format!(
                "{} writes to {}, not {}",
                request.action,
                target,
                plan.table()
            )));
        }
        config
            .guard()
            .check_table(plan.table())
            .and_then(|_| config.guard().check_write(&plan.statement()))
            .map_err(|e| ApprovalCommandError::Unsafe(e.to_string()))?;
        Ok(plan)
    }
}
