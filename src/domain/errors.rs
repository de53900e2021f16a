//! Error taxonomy of a turn.
//!
//! Every variant renders as a plain-text failure description that can be
//! shown to the user as the turn's response.

use crate::domain::routing::IntentParseError;

/// Failures of a single reasoning-service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Missing or rejected credential.
    #[error("authentication with the reasoning service failed: {0}")]
    Authentication(String),

    /// Non-2xx status or a reply that could not be read.
    #[error("reasoning service error: {0}")]
    Upstream(String),

    #[error("reasoning service timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Endpoint unreachable or misconfigured.
    #[error("reasoning service is unreachable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// True when the service could not be used at all, as opposed to a
    /// failed call.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_) | GatewayError::Authentication(_)
        )
    }
}

/// Pipeline stage a gateway failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classification,
    Intent,
    Resolution,
    Explanation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Classification => "classification",
            Stage::Intent => "intent",
            Stage::Resolution => "query synthesis",
            Stage::Explanation => "explanation",
        })
    }
}

/// Why a turn failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnError {
    /// The reasoning service cannot be used; the only error surfaced as a
    /// non-2xx response on the inbound boundary.
    #[error("The assistant is unavailable right now ({0}). Please try again later.")]
    GatewayUnavailable(GatewayError),

    #[error("The assistant could not complete the {stage} step: {source}")]
    Gateway {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("I could not understand that request: {0}")]
    IntentParse(#[from] IntentParseError),

    #[error("The generated query was rejected: {0}")]
    UnsafeQueryRejected(String),

    #[error("The data store rejected the request: {0}")]
    Execution(String),

    #[error("The interaction could not be recorded: {0}")]
    Audit(String),
}

impl TurnError {
    /// Maps a gateway failure in `stage`.
    ///
    /// Classification failures and an unusable service are both
    /// `GatewayUnavailable`; other stages keep the underlying error.
    pub fn from_gateway(stage: Stage, err: GatewayError) -> Self {
        if stage == Stage::Classification || err.is_unavailable() {
            TurnError::GatewayUnavailable(err)
        } else {
            TurnError::Gateway { stage, source: err }
        }
    }

    pub fn is_gateway_unavailable(&self) -> bool {
        matches!(self, TurnError::GatewayUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_failures_are_always_unavailable() {
        let err = TurnError::from_gateway(Stage::Classification, GatewayError::Upstream("500".into()));
        assert!(err.is_gateway_unavailable());
    }

    #[test]
    fn unreachable_service_is_unavailable_at_any_stage() {
        let err = TurnError::from_gateway(Stage::Intent, GatewayError::Unavailable("refused".into()));
        assert!(err.is_gateway_unavailable());
    }

    #[test]
    fn stage_failures_keep_their_cause() {
        let err = TurnError::from_gateway(Stage::Resolution, GatewayError::Timeout { timeout_secs: 60 });
        assert_eq!(
            err.to_string(),
            "The assistant could not complete the query synthesis step: reasoning service timed out after 60s"
        );
    }

    #[test]
    fn intent_errors_convert() {
        let err: TurnError = IntentParseError::NoJson.into();
        assert!(err.to_string().starts_with("I could not understand that request"));
    }
}
