//! Dispatcher - classifies a request into a business domain, runs that
//! domain's pipeline, and writes the interaction record.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::audit::{Interaction, InteractionOutcome, ToolName};
use crate::domain::errors::{Stage, TurnError};
use crate::domain::foundation::{ConversationId, InteractionId, Timestamp};
use crate::domain::routing::{BusinessDomain, DomainCatalog};
use crate::ports::{ApprovalStore, ContextRetriever, InteractionLog, QueryExecutor};

use super::gateway::ReasoningGateway;
use super::pipeline::{DomainPipeline, TurnInput};
use super::prompts;
use super::recorder::TurnRecorder;

/// Result of one dispatched turn, successful or not.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub interaction_id: InteractionId,
    pub domain: Option<BusinessDomain>,
    pub action: Option<String>,
    pub outcome: InteractionOutcome,
    /// Reply text; the failure description when the turn failed.
    pub response: String,
    pub error: Option<TurnError>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Dispatcher {
    gateway: Arc<ReasoningGateway>,
    pipelines: HashMap<BusinessDomain, DomainPipeline>,
    log: Arc<dyn InteractionLog>,
    default_domain: BusinessDomain,
}

impl Dispatcher {
    /// Builds one pipeline per domain in `catalog`, all sharing the same
    /// collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: &DomainCatalog,
        gateway: Arc<ReasoningGateway>,
        executor: Arc<dyn QueryExecutor>,
        retriever: Arc<dyn ContextRetriever>,
        approvals: Arc<dyn ApprovalStore>,
        log: Arc<dyn InteractionLog>,
        default_domain: BusinessDomain,
        context_k: usize,
    ) -> Self {
        let pipelines = BusinessDomain::ALL
            .iter()
            .filter_map(|domain| catalog.get(*domain))
            .map(|config| {
                (
                    config.domain(),
                    DomainPipeline::new(
                        config,
                        gateway.clone(),
                        executor.clone(),
                        retriever.clone(),
                        approvals.clone(),
                        context_k,
                    ),
                )
            })
            .collect();

        Self {
            gateway,
            pipelines,
            log,
            default_domain,
        }
    }

    /// Classifies `input`. A reply naming no known domain routes to the
    /// default domain; a failed classification call fails the turn.
    pub async fn route(
        &self,
        input: &TurnInput,
        recorder: &TurnRecorder,
    ) -> Result<BusinessDomain, TurnError> {
        let spec = prompts::classification(&input.text, &input.history);
        let reply = recorder
            .record(
                ToolName::Classify,
                spec.audit_payload(),
                self.gateway
                    .complete(recorder.interaction_id(), ToolName::Classify, &spec),
                |reply: &String| serde_json::Value::String(reply.clone()),
            )
            .await
            .map_err(|e| TurnError::from_gateway(Stage::Classification, e))?;

        match BusinessDomain::from_classification(&reply) {
            Some(domain) => Ok(domain),
            None => {
                tracing::warn!(
                    reply = %reply,
                    default = %self.default_domain,
                    "unrecognized classification; routing to default domain"
                );
                Ok(self.default_domain)
            }
        }
    }

    /// Runs one turn end to end and appends its interaction record.
    #[tracing::instrument(name = "turn", skip_all, fields(interaction_id = tracing::field::Empty))]
    pub async fn dispatch(
        &self,
        input: &TurnInput,
        conversation_id: Option<ConversationId>,
    ) -> TurnOutcome {
        let interaction_id = InteractionId::new();
        tracing::Span::current().record("interaction_id", tracing::field::display(interaction_id));
        let recorder = TurnRecorder::new(self.log.clone(), interaction_id);

        let mut domain = None;
        let result = match self.route(input, &recorder).await {
            Ok(routed) => {
                domain = Some(routed);
                match self.pipelines.get(&routed) {
                    Some(pipeline) => pipeline.run(input, &recorder).await,
                    None => {
                        let e = TurnError::Execution(format!("no pipeline for domain {routed}"));
                        recorder
                            .note(
                                ToolName::Classify,
                                serde_json::json!({ "domain": routed.tag() }),
                                Err(e.to_string()),
                            )
                            .await;
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        };

        let (response, outcome, mut error) = match result {
            Ok(reply) => (reply.response, reply.outcome, None),
            Err(e) => (e.to_string(), InteractionOutcome::Failed, Some(e)),
        };

        let interaction = Interaction::new(
            interaction_id,
            conversation_id,
            input.text.clone(),
            domain,
            recorder.action(),
            response.clone(),
            outcome,
            Timestamp::now(),
        );
        let appended = self.log.append_interaction(&interaction).await;
        let audit_failure = recorder
            .failure()
            .map(|e| e.to_string())
            .or_else(|| appended.err().map(|e| e.to_string()));
        if let Some(audit) = audit_failure {
            tracing::error!(error = %audit, "interaction is missing from the audit trail");
            error.get_or_insert(TurnError::Audit(audit));
        }

        tracing::info!(
            domain = ?domain,
            action = ?recorder.action(),
            outcome = outcome.as_str(),
            invocations = recorder.invocation_count(),
            "turn finished"
        );

        TurnOutcome {
            interaction_id,
            domain,
            action: recorder.action(),
            outcome,
            response,
            error,
        }
    }
}
