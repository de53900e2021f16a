//! Scripted reasoning service for tests.
//!
//! Replies are queued per purpose (the reasoning tool name) or in one shared
//! queue; an exhausted queue answers "Mock response". Every request is kept
//! so tests can inspect the prompts that were sent.
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response_for("reasoning.classify", "sales")
//!     .with_response_for("reasoning.intent", r#"{"action":"retrieve_orders","filters":{}}"#)
//!     .with_error_for("reasoning.explain", MockError::Timeout { timeout_secs: 60 });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, ProviderInfo,
    TokenUsage,
};

#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Replies consumed in order when no purpose-specific reply is queued.
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Replies keyed by `RequestMetadata::purpose`.
    by_purpose: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    info: ProviderInfo,
    delay: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Success { content: String },
    Error(MockError),
}

/// Injected failures; each maps onto the matching [`AIError`].
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Upstream { status: u16, message: String },
    Network { message: String },
    Timeout { timeout_secs: u64 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Upstream { status, message } => AIError::upstream(status, message),
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            by_purpose: Arc::new(Mutex::new(HashMap::new())),
            info: ProviderInfo::new("mock", "mock-model-1"),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the ordered queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Success {
                content: content.into(),
            });
        self
    }

    /// Adds an error response to the ordered queue.
    pub fn with_error(self, error: MockError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Error(error));
        self
    }

    /// Queues a reply for requests made with the given purpose.
    pub fn with_response_for(self, purpose: &str, content: impl Into<String>) -> Self {
        self.push_for(
            purpose,
            MockResponse::Success {
                content: content.into(),
            },
        );
        self
    }

    /// Queues an error for requests made with the given purpose.
    pub fn with_error_for(self, purpose: &str, error: MockError) -> Self {
        self.push_for(purpose, MockResponse::Error(error));
        self
    }

    fn push_for(&self, purpose: &str, response: MockResponse) {
        self.by_purpose
            .lock()
            .unwrap()
            .entry(purpose.to_string())
            .or_default()
            .push_back(response);
    }

    /// Sleeps this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Purposes of the recorded calls, in call order.
    pub fn purposes(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.metadata.purpose.clone())
            .collect()
    }

    /// Purpose queue first, then the shared queue.
    fn next_response(&self, purpose: &str) -> MockResponse {
        if let Some(response) = self
            .by_purpose
            .lock()
            .unwrap()
            .get_mut(purpose)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success {
                content: "Mock response".to_string(),
            })
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let purpose = request.metadata.purpose.clone();
        self.calls.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response(&purpose) {
            MockResponse::Success { content } => Ok(CompletionResponse {
                content,
                usage: TokenUsage::new(10, 20),
                model: self.info.model.clone(),
                finish_reason: FinishReason::Stop,
            }),
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::InteractionId;
    use crate::ports::{MessageRole, RequestMetadata};

    fn request(purpose: &str) -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(InteractionId::new(), purpose))
            .with_message(MessageRole::User, "Hello")
    }

    #[tokio::test]
    async fn returns_configured_responses_in_order() {
        let provider = MockAIProvider::new()
            .with_response("First")
            .with_response("Second");

        assert_eq!(provider.complete(request("a")).await.unwrap().content, "First");
        assert_eq!(provider.complete(request("a")).await.unwrap().content, "Second");
        assert_eq!(provider.complete(request("a")).await.unwrap().content, "Mock response");
    }

    #[tokio::test]
    async fn purpose_replies_take_precedence() {
        let provider = MockAIProvider::new()
            .with_response("general")
            .with_response_for("classify", "finance");

        assert_eq!(provider.complete(request("classify")).await.unwrap().content, "finance");
        assert_eq!(provider.complete(request("classify")).await.unwrap().content, "general");
    }

    #[tokio::test]
    async fn returns_configured_errors() {
        let provider = MockAIProvider::new()
            .with_error_for("explain", MockError::Timeout { timeout_secs: 60 })
            .with_error(MockError::AuthenticationFailed);

        assert_eq!(
            provider.complete(request("explain")).await.unwrap_err(),
            AIError::Timeout { timeout_secs: 60 }
        );
        assert_eq!(
            provider.complete(request("intent")).await.unwrap_err(),
            AIError::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn tracks_calls_and_purposes() {
        let provider = MockAIProvider::new();
        provider.complete(request("classify")).await.unwrap();
        provider.complete(request("intent")).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.purposes(), vec!["classify", "intent"]);
        assert_eq!(provider.get_calls()[0].last_user_message(), Some("Hello"));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let provider = MockAIProvider::new().with_response("shared");
        let clone = provider.clone();

        assert_eq!(clone.complete(request("x")).await.unwrap().content, "shared");
        assert_eq!(provider.call_count(), 1);
    }
}
