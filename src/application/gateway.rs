//! Reasoning Gateway - the single entry point to the external reasoning
//! service.
//!
//! Renders a [`PromptSpec`] into a completion request, makes exactly one
//! call, and translates provider failures into [`GatewayError`]. No retries,
//! no caching.

use std::sync::Arc;

use crate::domain::audit::ToolName;
use crate::domain::errors::GatewayError;
use crate::domain::foundation::InteractionId;
use crate::domain::prompt::PromptSpec;
use crate::ports::{AIError, AIProvider, CompletionRequest, MessageRole, RequestMetadata};

/// Sampling parameters applied to every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatewaySettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

pub struct ReasoningGateway {
    provider: Arc<dyn AIProvider>,
    settings: GatewaySettings,
}

impl ReasoningGateway {
    pub fn new(provider: Arc<dyn AIProvider>, settings: GatewaySettings) -> Self {
        Self { provider, settings }
    }

    /// Sends `spec` and returns the trimmed reply text.
    pub async fn complete(
        &self,
        interaction_id: InteractionId,
        purpose: ToolName,
        spec: &PromptSpec,
    ) -> Result<String, GatewayError> {
        let request = self.to_request(interaction_id, purpose, spec);
        let response = self.provider.complete(request).await.map_err(translate)?;

        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(GatewayError::Upstream("empty reply".to_string()));
        }
        Ok(reply.to_string())
    }

    fn to_request(
        &self,
        interaction_id: InteractionId,
        purpose: ToolName,
        spec: &PromptSpec,
    ) -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(interaction_id, purpose.as_str()))
            .with_message(MessageRole::System, spec.system_message())
            .with_message(MessageRole::User, spec.user_text())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

/// Provider error to gateway error. This is the only place the translation
/// happens.
fn translate(err: AIError) -> GatewayError {
    match err {
        AIError::AuthenticationFailed => {
            GatewayError::Authentication("credential missing or rejected".to_string())
        }
        AIError::Unavailable { message } => GatewayError::Unavailable(message),
        AIError::Timeout { timeout_secs } => GatewayError::Timeout { timeout_secs },
        other => GatewayError::Upstream(other.to_string()),
    }
}
