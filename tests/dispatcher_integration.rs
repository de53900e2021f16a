//! End-to-end turns through the dispatcher against a seeded SQLite store.

mod common;

use common::HarnessBuilder;
use erp_copilot::adapters::ai::{MockAIProvider, MockError};
use erp_copilot::application::{ApproveMutationCommand, ListPendingHandler, TurnInput};
use erp_copilot::domain::approval::ApprovalStatus;
use erp_copilot::domain::audit::{InteractionOutcome, ToolName};
use erp_copilot::domain::errors::TurnError;
use erp_copilot::domain::routing::BusinessDomain;
use erp_copilot::ports::{ApprovalStore, InteractionLog};

const CANCELLED_ORDERS: &str =
    "SELECT id, status, total FROM orders WHERE status = 'cancelled' ORDER BY id";

fn explain_down() -> MockError {
    MockError::Upstream {
        status: 500,
        message: "explainer crashed".into(),
    }
}

fn tools(invocations: &[erp_copilot::domain::audit::ToolInvocation]) -> Vec<ToolName> {
    invocations.iter().map(|i| i.tool_name()).collect()
}

#[tokio::test]
async fn read_turn_falls_back_to_formatted_rows_when_explanation_fails() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for(
            "reasoning.intent",
            r#"{"action": "retrieve_orders", "filters": {"status": "cancelled"}}"#,
        )
        .with_response_for("reasoning.synthesize_query", CANCELLED_ORDERS)
        .with_error_for("reasoning.explain", explain_down());
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("show me cancelled orders"), None)
        .await;

    assert!(turn.is_success(), "turn failed: {:?}", turn.error);
    assert_eq!(turn.domain, Some(BusinessDomain::Sales));
    assert_eq!(turn.action.as_deref(), Some("retrieve_orders"));
    assert_eq!(
        turn.response,
        "2 records:\n1. id: 2, status: cancelled, total: 80.0\n2. id: 4, status: cancelled, total: 19.0"
    );

    let invocations = harness.invocations(turn.interaction_id).await;
    let seqs: Vec<u32> = invocations.iter().map(|i| i.seq()).collect();
    assert_eq!(seqs, (1..=invocations.len() as u32).collect::<Vec<_>>());
    for pair in invocations.windows(2) {
        assert!(pair[0].invoked_at() <= pair[1].invoked_at());
    }
    let recorded = tools(&invocations);
    assert!(recorded.contains(&ToolName::SqlRead));
    assert!(recorded.contains(&ToolName::RetrieverSearch));
    let explain = invocations
        .iter()
        .find(|i| i.tool_name() == ToolName::Explain)
        .unwrap();
    assert!(explain.error().is_some());

    let stored = harness
        .log
        .find_interaction(turn.interaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.outcome(), InteractionOutcome::Completed);
    assert_eq!(stored.response(), turn.response);
}

#[tokio::test]
async fn create_turn_writes_exactly_one_row() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for(
            "reasoning.intent",
            r#"{"action": "new_lead", "filters": {"customer": "Initech"}}"#,
        )
        .with_response_for(
            "reasoning.synthesize_mutation",
            r#"{"table": "leads", "values": {"name": "Initech", "email": "buyer@initech.test"}}"#,
        )
        .with_error_for("reasoning.explain", explain_down());
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("add Initech as a new lead"), None)
        .await;

    assert!(turn.is_success(), "turn failed: {:?}", turn.error);
    assert_eq!(turn.response, "Created 1 record in leads (id 1).");
    assert_eq!(harness.count("leads").await, 1);

    let name: String = sqlx::query_scalar("SELECT name FROM leads WHERE id = 1")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(name, "Initech");

    let invocations = harness.invocations(turn.interaction_id).await;
    let writes = invocations
        .iter()
        .filter(|i| i.tool_name() == ToolName::SqlWrite)
        .count();
    assert_eq!(writes, 1);
}

fn big_invoice_mock(times: usize) -> MockAIProvider {
    let mut mock = MockAIProvider::new();
    for _ in 0..times {
        mock = mock
            .with_response_for("reasoning.classify", "finance")
            .with_response_for(
                "reasoning.intent",
                r#"{"action": "new_invoice", "filters": {"customer": "Acme"}}"#,
            )
            .with_response_for(
                "reasoning.synthesize_mutation",
                r#"{"table": "invoices", "values": {"customer_id": 1, "total_amount": 50000, "status": "open"}}"#,
            );
    }
    mock
}

#[tokio::test]
async fn large_invoice_is_held_and_resubmission_is_deduplicated() {
    let harness = HarnessBuilder::new(big_invoice_mock(2))
        .invoice_threshold(10_000.0)
        .build()
        .await;
    let input = TurnInput::new("invoice Acme 50000").with_requested_by("clerk");

    let first = harness.dispatcher.dispatch(&input, None).await;

    assert!(first.is_success(), "turn failed: {:?}", first.error);
    assert_eq!(first.outcome, InteractionOutcome::PendingApproval);
    assert!(first.response.starts_with("Approval is required"));
    assert!(first.response.contains("pending request #"));
    assert_eq!(harness.count("invoices").await, 0);
    let recorded = tools(&harness.invocations(first.interaction_id).await);
    assert!(recorded.contains(&ToolName::ApprovalSubmit));
    assert!(!recorded.contains(&ToolName::SqlWrite));

    let second = harness.dispatcher.dispatch(&input, None).await;

    assert_eq!(second.outcome, InteractionOutcome::PendingApproval);
    assert!(second
        .response
        .starts_with("An identical request is already awaiting approval"));
    assert_eq!(harness.count("invoices").await, 0);

    let pending = ListPendingHandler::new(harness.approvals.clone())
        .handle()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requested_by, "clerk");
    assert_eq!(pending[0].amount, Some(50_000.0));
}

#[tokio::test]
async fn approving_a_held_invoice_commits_it_once() {
    let harness = HarnessBuilder::new(big_invoice_mock(1))
        .invoice_threshold(10_000.0)
        .build()
        .await;
    harness
        .dispatcher
        .dispatch(&TurnInput::new("invoice Acme 50000"), None)
        .await;
    let pending = harness.approvals.list_pending().await.unwrap();
    let approval_id = pending[0].id;

    let result = harness
        .approve_handler()
        .handle(ApproveMutationCommand {
            approval_id,
            decided_by: "controller".into(),
        })
        .await
        .unwrap();

    assert_eq!(result.rows_affected, 1);
    assert_eq!(result.request.status, ApprovalStatus::Approved);
    assert_eq!(harness.count("invoices").await, 1);
    assert!(harness.approvals.list_pending().await.unwrap().is_empty());

    let again = harness
        .approve_handler()
        .handle(ApproveMutationCommand {
            approval_id,
            decided_by: "controller".into(),
        })
        .await;
    assert!(again.is_err());
    assert_eq!(harness.count("invoices").await, 1);
}

#[tokio::test]
async fn small_invoice_is_written_directly() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "finance")
        .with_response_for("reasoning.intent", r#"{"action": "new_invoice", "filters": {}}"#)
        .with_response_for(
            "reasoning.synthesize_mutation",
            r#"{"table": "invoices", "values": {"customer_id": 2, "total_amount": 250, "status": "open"}}"#,
        )
        .with_response_for("reasoning.explain", "Invoice 1 was created for Globex.");
    let harness = HarnessBuilder::new(mock)
        .invoice_threshold(10_000.0)
        .build()
        .await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("invoice Globex 250"), None)
        .await;

    assert_eq!(turn.outcome, InteractionOutcome::Completed);
    assert_eq!(turn.response, "Invoice 1 was created for Globex.");
    assert_eq!(harness.count("invoices").await, 1);
    assert!(harness.approvals.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn unrecognized_classification_routes_to_default_domain() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "I am not sure")
        .with_response_for("reasoning.intent", r#"{"action": "search_definitions"}"#)
        .with_error_for("reasoning.explain", explain_down());
    let harness = HarnessBuilder::new(mock)
        .default_domain(BusinessDomain::Analytics)
        .build()
        .await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("what does churn mean"), None)
        .await;

    assert_eq!(turn.domain, Some(BusinessDomain::Analytics));
    assert_eq!(turn.action.as_deref(), Some("search_definitions"));
    assert_eq!(turn.response, "No relevant documents were found.");
}

#[tokio::test]
async fn statement_outside_the_allowlist_is_rejected_before_execution() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for("reasoning.intent", r#"{"action": "retrieve_customers"}"#)
        .with_response_for(
            "reasoning.synthesize_query",
            "SELECT id, total_amount FROM invoices",
        );
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("show customers"), None)
        .await;

    assert!(matches!(turn.error, Some(TurnError::UnsafeQueryRejected(_))));
    assert_eq!(turn.outcome, InteractionOutcome::Failed);

    let invocations = harness.invocations(turn.interaction_id).await;
    let recorded = tools(&invocations);
    assert!(recorded.contains(&ToolName::StatementGuard));
    assert!(!recorded.contains(&ToolName::SqlRead));
    let guard = invocations
        .iter()
        .find(|i| i.tool_name() == ToolName::StatementGuard)
        .unwrap();
    assert!(guard.error().is_some());
}

#[tokio::test]
async fn destructive_statement_is_rejected() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for("reasoning.intent", r#"{"action": "retrieve_orders"}"#)
        .with_response_for("reasoning.synthesize_query", "DELETE FROM orders");
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("clean up orders"), None)
        .await;

    assert!(matches!(turn.error, Some(TurnError::UnsafeQueryRejected(_))));
    assert_eq!(harness.count("orders").await, 4);
}

#[tokio::test]
async fn document_lookup_ranks_and_caps_keyword_matches() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for("reasoning.intent", r#"{"action": "search_documents"}"#)
        .with_error_for("reasoning.explain", explain_down());
    let harness = HarnessBuilder::new(mock).context_k(2).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("how are cancelled orders handled"), None)
        .await;

    assert!(turn.is_success(), "turn failed: {:?}", turn.error);
    let lines: Vec<&str> = turn.response.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("(cancellation-policy)"));
    assert!(lines[1].ends_with("(discount-rules)"));
}

#[tokio::test]
async fn finance_policy_lookup_only_sees_tagged_documents() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "finance")
        .with_response_for("reasoning.intent", r#"{"action": "search_policies"}"#)
        .with_error_for("reasoning.explain", explain_down());
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("when are invoices due"), None)
        .await;

    assert_eq!(
        turn.response,
        "- Invoices are due in 30 days. (invoice-policy)"
    );
}

#[tokio::test]
async fn unavailable_reasoning_service_fails_the_turn_and_is_audited() {
    let mock = MockAIProvider::new().with_error(MockError::Unavailable {
        message: "connection refused".into(),
    });
    let harness = HarnessBuilder::new(mock).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("show orders"), None)
        .await;

    assert!(turn.error.as_ref().unwrap().is_gateway_unavailable());
    let stored = harness
        .log
        .find_interaction(turn.interaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.outcome(), InteractionOutcome::Failed);
}

fn run_report(filters: &str) -> MockAIProvider {
    MockAIProvider::new()
        .with_response_for("reasoning.classify", "analytics")
        .with_response_for(
            "reasoning.intent",
            format!(r#"{{"action": "run_saved_report", "filters": {filters}}}"#),
        )
        .with_error_for("reasoning.explain", explain_down())
}

#[tokio::test]
async fn saved_report_runs_its_stored_query() {
    let harness = HarnessBuilder::new(run_report(r#"{"report_id": 1}"#)).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("run report 1"), None)
        .await;

    assert!(turn.is_success(), "turn failed: {:?}", turn.error);
    assert_eq!(turn.domain, Some(BusinessDomain::Analytics));
    assert_eq!(turn.action.as_deref(), Some("run_saved_report"));
    assert_eq!(
        turn.response,
        "3 records:\n1. n: 2, status: cancelled\n2. n: 1, status: open\n3. n: 1, status: shipped"
    );

    let invocations = harness.invocations(turn.interaction_id).await;
    let reads: Vec<_> = invocations
        .iter()
        .filter(|i| i.tool_name() == ToolName::SqlRead)
        .collect();
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[0].input()["params"], serde_json::json!([1]));
    let guard = invocations
        .iter()
        .find(|i| i.tool_name() == ToolName::StatementGuard)
        .unwrap();
    assert_eq!(guard.input()["report_id"], serde_json::json!(1));
    assert!(guard.error().is_none());
}

#[tokio::test]
async fn saved_report_outside_the_allowlist_is_refused() {
    let harness = HarnessBuilder::new(run_report(r#"{"report_id": "2"}"#)).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("run report 2"), None)
        .await;

    assert!(matches!(turn.error, Some(TurnError::UnsafeQueryRejected(_))));
    assert!(turn.response.contains("approval_requests"));
    let recorded = tools(&harness.invocations(turn.interaction_id).await);
    assert_eq!(
        recorded.iter().filter(|t| **t == ToolName::SqlRead).count(),
        1,
        "only the report lookup may run"
    );
}

#[tokio::test]
async fn unknown_saved_report_is_answered_not_failed() {
    let harness = HarnessBuilder::new(run_report(r#"{"report_id": 99}"#)).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("run report 99"), None)
        .await;

    assert!(turn.is_success());
    assert_eq!(turn.response, "Saved report 99 was not found.");
}

#[tokio::test]
async fn saved_report_without_an_id_fails_at_intent() {
    let harness = HarnessBuilder::new(run_report("{}")).build().await;

    let turn = harness
        .dispatcher
        .dispatch(&TurnInput::new("run the report"), None)
        .await;

    assert!(matches!(turn.error, Some(TurnError::IntentParse(_))));
    let invocations = harness.invocations(turn.interaction_id).await;
    let last = invocations.last().unwrap();
    assert_eq!(last.tool_name(), ToolName::Intent);
    assert!(last.error().unwrap().contains("report_id"));
    assert!(invocations.iter().all(|i| i.tool_name() != ToolName::SqlRead));
}
