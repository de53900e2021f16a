//! The REST surface driven in-process through the router.

mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::HarnessBuilder;
use erp_copilot::adapters::ai::{MockAIProvider, MockError};
use erp_copilot::adapters::http::app_router;

async fn router(mock: MockAIProvider) -> (Router, common::Harness) {
    let harness = HarnessBuilder::new(mock)
        .invoice_threshold(10_000.0)
        .build()
        .await;
    let router = app_router(harness.http_handlers(), Duration::from_secs(30));
    (router, harness)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn unavailable_reasoning_service_answers_503() {
    let mock = MockAIProvider::new().with_error(MockError::Unavailable {
        message: "connection refused".into(),
    });
    let (router, harness) = router(mock).await;

    let (status, body) = send(&router, "POST", "/chat", Some(json!({"message": "show orders"}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "GATEWAY_UNAVAILABLE");
    assert_eq!(harness.count("audit_interactions").await, 1);
}

#[tokio::test]
async fn chat_starts_a_conversation_and_follow_up_reuses_it() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "sales")
        .with_response_for("reasoning.classify", "sales")
        .with_response_for("reasoning.intent", r#"{"action": "search_documents"}"#)
        .with_response_for("reasoning.intent", r#"{"action": "search_documents"}"#)
        .with_response_for("reasoning.explain", "Cancelled orders are refunded.")
        .with_response_for("reasoning.explain", "They keep their number.");
    let (router, harness) = router(mock.clone()).await;

    let (status, first) = send(
        &router,
        "POST",
        "/chat",
        Some(json!({"message": "what happens to cancelled orders"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["response"], "Cancelled orders are refunded.");
    assert_eq!(first["domain"], "sales");
    assert_eq!(first["outcome"], "completed");
    let conversation_id = first["conversation_id"].as_i64().unwrap();

    let (status, second) = send(
        &router,
        "POST",
        "/chat",
        Some(json!({"message": "and their order numbers?", "conversation_id": conversation_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["conversation_id"].as_i64(), Some(conversation_id));
    assert_eq!(harness.count("chat_messages").await, 4);

    let follow_up_intent = mock
        .get_calls()
        .into_iter()
        .filter(|c| c.metadata.purpose == "reasoning.intent")
        .nth(1)
        .unwrap();
    let prompt: String = follow_up_intent
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(prompt.contains("Cancelled orders are refunded."));
}

#[tokio::test]
async fn unknown_conversation_is_404_and_empty_message_is_400() {
    let (router, _harness) = router(MockAIProvider::new()).await;

    let (status, body) = send(
        &router,
        "POST",
        "/chat",
        Some(json!({"message": "hello", "conversation_id": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&router, "POST", "/chat", Some(json!({"message": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn held_invoice_can_be_listed_approved_once_and_not_again() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "finance")
        .with_response_for("reasoning.intent", r#"{"action": "new_invoice"}"#)
        .with_response_for(
            "reasoning.synthesize_mutation",
            r#"{"customer_id": 1, "total_amount": 50000, "status": "open"}"#,
        );
    let (router, harness) = router(mock).await;

    let (status, chat) = send(
        &router,
        "POST",
        "/chat",
        Some(json!({"message": "invoice Acme 50000", "requested_by": "clerk"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat["outcome"], "pending_approval");
    assert_eq!(harness.count("invoices").await, 0);

    let (status, pending) = send(&router, "GET", "/approvals/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = pending["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["requested_by"], "clerk");
    assert_eq!(items[0]["status"], "pending");
    let id = items[0]["id"].as_i64().unwrap();

    let approve = format!("/approvals/{id}/approve");
    let (status, decision) =
        send(&router, "POST", &approve, Some(json!({"decided_by": "controller"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["request"]["status"], "approved");
    assert_eq!(decision["request"]["decided_by"], "controller");
    assert_eq!(decision["rows_affected"], 1);
    assert_eq!(harness.count("invoices").await, 1);

    let (status, body) = send(&router, "POST", &approve, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(harness.count("invoices").await, 1);
}

#[tokio::test]
async fn rejected_request_writes_nothing() {
    let mock = MockAIProvider::new()
        .with_response_for("reasoning.classify", "finance")
        .with_response_for("reasoning.intent", r#"{"action": "new_invoice"}"#)
        .with_response_for(
            "reasoning.synthesize_mutation",
            r#"{"customer_id": 2, "total_amount": 20000}"#,
        );
    let (router, harness) = router(mock).await;
    send(&router, "POST", "/chat", Some(json!({"message": "invoice Globex 20000"}))).await;
    let (_, pending) = send(&router, "GET", "/approvals/pending", None).await;
    let id = pending["items"][0]["id"].as_i64().unwrap();

    let (status, decision) = send(&router, "POST", &format!("/approvals/{id}/reject"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["request"]["status"], "rejected");
    assert_eq!(decision["request"]["decided_by"], "reviewer");
    assert_eq!(harness.count("invoices").await, 0);

    let (status, _) = send(&router, "POST", &format!("/approvals/{id}/approve"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_or_malformed_approval_ids() {
    let (router, _harness) = router(MockAIProvider::new()).await;

    let (status, _) = send(&router, "POST", "/approvals/41/approve", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "POST", "/approvals/abc/approve", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
