//! Domain Action Pipeline - one generic implementation parameterized by a
//! [`DomainConfig`].
//!
//! Stages:
//! 1. Intent: reasoning call, parsed against the domain's action enumeration.
//! 2. Resolution: a read statement (retrieve) or a mutation plan (create),
//!    both checked by the domain's statement guard before anything runs.
//! 3. Execution: the statement, joined with context retrieval for
//!    RAG-eligible actions. Create actions with an approval rule above
//!    threshold are held as pending instead of written.
//! 4. Explanation: reasoning call over the results, falling back to a
//!    deterministic rendering when the call fails.
//!
//! Lookup actions skip resolution and answer from retrieved documents.
//! Saved-report actions resolve to the stored statement of the report named
//! by the `report_id` filter, which passes through the same guard.

use futures::future::OptionFuture;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::approval::{ApprovalDecision, NewPendingMutation, Submission};
use crate::domain::audit::{InteractionOutcome, ToolName};
use crate::domain::errors::{GatewayError, Stage, TurnError};
use crate::domain::formatting::{
    approval_required, format_rows, format_snippets, format_write, no_matching_records,
    report_not_found,
};
use crate::domain::mutation::MutationPlan;
use crate::domain::prompt::PromptSpec;
use crate::domain::query::{Row, SqlValue, WriteOutcome};
use crate::domain::retrieval::{RetrievedContext, SearchRequest};
use crate::domain::routing::{ActionKind, ActionSpec, DomainConfig, Intent, IntentParseError};
use crate::ports::{ApprovalStore, ContextRetriever, Message, QueryExecutor, RetrievalError};

use super::gateway::ReasoningGateway;
use super::prompts;
use super::recorder::TurnRecorder;

/// Loads the stored statement of one saved report.
const SAVED_REPORT_LOOKUP: &str = "SELECT id, name, sql_template FROM saved_reports WHERE id = ?";

/// Input of one pipeline run.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub text: String,
    pub history: Vec<Message>,
    pub requested_by: String,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            history: Vec::new(),
            requested_by: "anonymous".to_string(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = requested_by.into();
        self
    }
}

/// Successful result of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReply {
    pub action: String,
    pub response: String,
    pub outcome: InteractionOutcome,
}

pub struct DomainPipeline {
    config: Arc<DomainConfig>,
    gateway: Arc<ReasoningGateway>,
    executor: Arc<dyn QueryExecutor>,
    retriever: Arc<dyn ContextRetriever>,
    approvals: Arc<dyn ApprovalStore>,
    context_k: usize,
}

impl DomainPipeline {
    pub fn new(
        config: Arc<DomainConfig>,
        gateway: Arc<ReasoningGateway>,
        executor: Arc<dyn QueryExecutor>,
        retriever: Arc<dyn ContextRetriever>,
        approvals: Arc<dyn ApprovalStore>,
        context_k: usize,
    ) -> Self {
        Self {
            config,
            gateway,
            executor,
            retriever,
            approvals,
            context_k,
        }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    #[tracing::instrument(
        name = "pipeline",
        skip_all,
        fields(interaction_id = %recorder.interaction_id(), domain = %self.config.domain())
    )]
    pub async fn run(
        &self,
        input: &TurnInput,
        recorder: &TurnRecorder,
    ) -> Result<PipelineReply, TurnError> {
        let (intent, action) = self.extract_intent(input, recorder).await?;
        recorder.set_action(intent.action());
        tracing::debug!(action = action.name(), filters = ?intent.filters(), "intent resolved");

        let (response, outcome) = match action.kind() {
            ActionKind::Retrieve => self.retrieve(input, &intent, action, recorder).await?,
            ActionKind::Create => self.create(input, &intent, action, recorder).await?,
            ActionKind::Lookup => self.lookup(input, action, recorder).await?,
            ActionKind::SavedReport => self.saved_report(input, &intent, action, recorder).await?,
        };

        Ok(PipelineReply {
            action: action.name().to_string(),
            response,
            outcome,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stages
    // ═══════════════════════════════════════════════════════════════════════

    async fn extract_intent(
        &self,
        input: &TurnInput,
        recorder: &TurnRecorder,
    ) -> Result<(Intent, &ActionSpec), TurnError> {
        let spec = prompts::intent(&self.config, &input.text, &input.history);
        let reply = self
            .reason(ToolName::Intent, &spec, recorder)
            .await
            .map_err(|e| TurnError::from_gateway(Stage::Intent, e))?;

        let resolved = Intent::resolve(&reply, &self.config);
        if let Err(e) = &resolved {
            recorder
                .note(ToolName::Intent, json!({ "reply": reply }), Err(e.to_string()))
                .await;
        }
        Ok(resolved?)
    }

    async fn retrieve(
        &self,
        input: &TurnInput,
        intent: &Intent,
        action: &ActionSpec,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let spec = prompts::query_synthesis(&self.config, action, intent, &input.text);
        let proposed = self
            .reason(ToolName::SynthesizeQuery, &spec, recorder)
            .await
            .map_err(|e| TurnError::from_gateway(Stage::Resolution, e))?;

        let guard_input = json!({ "statement": proposed, "class": "read" });
        self.read_and_explain(input, action, &proposed, guard_input, recorder)
            .await
    }

    async fn saved_report(
        &self,
        input: &TurnInput,
        intent: &Intent,
        action: &ActionSpec,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let Some(report_id) = intent.integer_filter("report_id") else {
            let e = IntentParseError::MissingFilter("report_id");
            recorder
                .note(ToolName::Intent, intent.to_json(), Err(e.to_string()))
                .await;
            return Err(e.into());
        };

        let params = [SqlValue::Integer(report_id)];
        let found = recorder
            .record(
                ToolName::SqlRead,
                json!({ "statement": SAVED_REPORT_LOOKUP, "params": [report_id] }),
                self.executor.read_with(SAVED_REPORT_LOOKUP, &params),
                |rows: &Vec<Row>| json!({ "row_count": rows.len(), "rows": rows }),
            )
            .await
            .map_err(|e| TurnError::Execution(e.to_string()))?;

        let Some(report) = found.first() else {
            return Ok((report_not_found(report_id), InteractionOutcome::Completed));
        };
        let template = report
            .get("sql_template")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TurnError::Execution(format!("saved report {report_id} has no stored query"))
            })?;
        tracing::debug!(report_id, name = ?report.get("name"), "running saved report");

        let guard_input = json!({ "statement": template, "class": "read", "report_id": report_id });
        self.read_and_explain(input, action, template, guard_input, recorder)
            .await
    }

    /// Guard, read (joined with context retrieval when the action asks for
    /// it) and explanation, shared by every statement-backed read.
    async fn read_and_explain(
        &self,
        input: &TurnInput,
        action: &ActionSpec,
        proposed: &str,
        guard_input: Value,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let checked = self.config.guard().check_read(proposed);
        recorder
            .note(
                ToolName::StatementGuard,
                guard_input,
                checked
                    .as_ref()
                    .map(|s| json!({ "statement": s }))
                    .map_err(ToString::to_string),
            )
            .await;
        let statement = checked.map_err(|e| TurnError::UnsafeQueryRejected(e.to_string()))?;

        let read = recorder.record(
            ToolName::SqlRead,
            json!({ "statement": statement }),
            self.executor.read(&statement),
            |rows: &Vec<Row>| json!({ "row_count": rows.len(), "rows": rows }),
        );
        let context: OptionFuture<_> = action
            .is_rag_eligible()
            .then(|| {
                let request =
                    SearchRequest::new(&input.text, self.config.domain(), self.context_k);
                self.search(request, recorder)
            })
            .into();

        let (rows, context) = tokio::join!(read, context);
        let rows = rows.map_err(|e| TurnError::Execution(e.to_string()))?;
        let context = match context {
            Some(Ok(context)) => context,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "context retrieval failed; explaining rows alone");
                RetrievedContext::empty()
            }
            None => RetrievedContext::empty(),
        };

        if rows.is_empty() {
            return Ok((no_matching_records(), InteractionOutcome::Completed));
        }

        let spec = prompts::explain_rows(&self.config, &input.text, &rows, &context);
        let response = self.explain(&spec, recorder, || format_rows(&rows)).await;
        Ok((response, InteractionOutcome::Completed))
    }

    async fn create(
        &self,
        input: &TurnInput,
        intent: &Intent,
        action: &ActionSpec,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let spec = prompts::mutation_synthesis(&self.config, action, intent, &input.text);
        let proposed = self
            .reason(ToolName::SynthesizeMutation, &spec, recorder)
            .await
            .map_err(|e| TurnError::from_gateway(Stage::Resolution, e))?;

        let planned = MutationPlan::from_proposal(
            &proposed,
            action,
            self.config.schema(),
            self.config.guard(),
        )
        .map_err(|e| e.to_string())
        .and_then(|plan| {
            self.config
                .guard()
                .check_write(&plan.statement())
                .map(|_| plan)
                .map_err(|e| e.to_string())
        });
        recorder
            .note(
                ToolName::StatementGuard,
                json!({ "proposal": proposed, "class": "write" }),
                planned
                    .as_ref()
                    .map(|p| json!({ "statement": p.statement(), "payload": p.payload() }))
                    .map_err(Clone::clone),
            )
            .await;
        let plan = planned.map_err(TurnError::UnsafeQueryRejected)?;

        if let Some(rule) = action.approval() {
            if let ApprovalDecision::Required { amount, threshold } = rule.evaluate(&plan) {
                return self
                    .hold_for_approval(input, action, &plan, amount, threshold, recorder)
                    .await;
            }
        }

        let outcome = recorder
            .record(
                ToolName::SqlWrite,
                json!({ "statement": plan.statement(), "params": plan.payload()["values"] }),
                self.executor.write(&plan.statement(), plan.params()),
                |o: &WriteOutcome| {
                    json!({
                        "rows_affected": o.rows_affected,
                        "last_insert_id": o.last_insert_id,
                    })
                },
            )
            .await
            .map_err(|e| TurnError::Execution(e.to_string()))?;

        let summary = format_write(plan.table(), outcome.rows_affected, outcome.last_insert_id);
        let spec = prompts::explain_write(&self.config, &input.text, &summary);
        let response = self.explain(&spec, recorder, || summary.clone()).await;
        Ok((response, InteractionOutcome::Completed))
    }

    async fn hold_for_approval(
        &self,
        input: &TurnInput,
        action: &ActionSpec,
        plan: &MutationPlan,
        amount: Option<f64>,
        threshold: f64,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let request = NewPendingMutation::new(
            self.config.domain(),
            action.name(),
            plan,
            amount,
            threshold,
            input.requested_by.clone(),
            recorder.interaction_id(),
        );
        let submission = recorder
            .record(
                ToolName::ApprovalSubmit,
                json!({
                    "action": action.name(),
                    "payload": request.payload,
                    "amount": amount,
                    "threshold": threshold,
                }),
                self.approvals.submit(request.clone()),
                |s: &Submission| {
                    json!({
                        "approval_id": s.request().id.as_i64(),
                        "existing": matches!(s, Submission::Existing(_)),
                    })
                },
            )
            .await
            .map_err(|e| TurnError::Execution(e.to_string()))?;

        let pending = submission.request();
        tracing::info!(
            approval_id = %pending.id,
            action = action.name(),
            amount = ?amount,
            threshold,
            "mutation held for approval"
        );
        Ok((
            approval_required(
                action.name(),
                pending.id.as_i64(),
                amount,
                threshold,
                matches!(submission, Submission::Existing(_)),
            ),
            InteractionOutcome::PendingApproval,
        ))
    }

    async fn lookup(
        &self,
        input: &TurnInput,
        action: &ActionSpec,
        recorder: &TurnRecorder,
    ) -> Result<(String, InteractionOutcome), TurnError> {
        let request = SearchRequest::new(&input.text, self.config.domain(), self.context_k)
            .with_tags(action.document_tags().iter().copied());
        let context = self
            .search(request, recorder)
            .await
            .map_err(|e| TurnError::Execution(e.to_string()))?;

        if context.is_empty() {
            return Ok((format_snippets(&context), InteractionOutcome::Completed));
        }

        let spec = prompts::explain_documents(&self.config, &input.text, &context);
        let response = self.explain(&spec, recorder, || format_snippets(&context)).await;
        Ok((response, InteractionOutcome::Completed))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Recorded calls
    // ═══════════════════════════════════════════════════════════════════════

    async fn reason(
        &self,
        tool: ToolName,
        spec: &PromptSpec,
        recorder: &TurnRecorder,
    ) -> Result<String, GatewayError> {
        recorder
            .record(
                tool,
                spec.audit_payload(),
                self.gateway.complete(recorder.interaction_id(), tool, spec),
                |reply: &String| Value::String(reply.clone()),
            )
            .await
    }

    async fn search(
        &self,
        request: SearchRequest,
        recorder: &TurnRecorder,
    ) -> Result<RetrievedContext, RetrievalError> {
        let mode = self.retriever.mode();
        recorder
            .record(
                ToolName::RetrieverSearch,
                json!({
                    "query": request.query,
                    "domain": request.domain.tag(),
                    "k": request.k,
                    "tags": request.tags,
                    "mode": mode.as_str(),
                }),
                self.retriever.search(&request),
                |context: &RetrievedContext| json!(context),
            )
            .await
    }

    /// Explanation call; its failure is the one recoverable failure of a
    /// turn and degrades to `fallback`.
    async fn explain(
        &self,
        spec: &PromptSpec,
        recorder: &TurnRecorder,
        fallback: impl FnOnce() -> String,
    ) -> String {
        match self.reason(ToolName::Explain, spec, recorder).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "explanation failed; returning formatted results");
                fallback()
            }
        }
    }
}
