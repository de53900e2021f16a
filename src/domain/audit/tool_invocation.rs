//! Tool invocation entity - audit record for every external call of a turn.
//!
//! Every call into the reasoning gateway, the query executor, the context
//! retriever, the statement guard or the approval store is captured as one
//! `ToolInvocation`, in call order, so a turn's response can be traced back
//! to the inputs and outputs that produced it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{InteractionId, Timestamp, ToolInvocationId};

/// The capability that was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    #[serde(rename = "reasoning.classify")]
    Classify,
    #[serde(rename = "reasoning.intent")]
    Intent,
    #[serde(rename = "reasoning.synthesize_query")]
    SynthesizeQuery,
    #[serde(rename = "reasoning.synthesize_mutation")]
    SynthesizeMutation,
    #[serde(rename = "reasoning.explain")]
    Explain,
    #[serde(rename = "sql.read")]
    SqlRead,
    #[serde(rename = "sql.write")]
    SqlWrite,
    #[serde(rename = "retriever.search")]
    RetrieverSearch,
    #[serde(rename = "safety.statement_guard")]
    StatementGuard,
    #[serde(rename = "approvals.submit")]
    ApprovalSubmit,
}

impl ToolName {
    pub const ALL: [ToolName; 10] = [
        ToolName::Classify,
        ToolName::Intent,
        ToolName::SynthesizeQuery,
        ToolName::SynthesizeMutation,
        ToolName::Explain,
        ToolName::SqlRead,
        ToolName::SqlWrite,
        ToolName::RetrieverSearch,
        ToolName::StatementGuard,
        ToolName::ApprovalSubmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Classify => "reasoning.classify",
            ToolName::Intent => "reasoning.intent",
            ToolName::SynthesizeQuery => "reasoning.synthesize_query",
            ToolName::SynthesizeMutation => "reasoning.synthesize_mutation",
            ToolName::Explain => "reasoning.explain",
            ToolName::SqlRead => "sql.read",
            ToolName::SqlWrite => "sql.write",
            ToolName::RetrieverSearch => "retriever.search",
            ToolName::StatementGuard => "safety.statement_guard",
            ToolName::ApprovalSubmit => "approvals.submit",
        }
    }

    /// True for calls into the reasoning service.
    pub fn is_reasoning(&self) -> bool {
        self.as_str().starts_with("reasoning.")
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown tool name: {s}"))
    }
}

/// A recorded call made during an interaction.
///
/// # Invariants
///
/// - `invoked_at <= completed_at`
/// - `seq` starts at 1, is unique within the interaction and increases in
///   call order
/// - exactly one of output / error is present
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    id: ToolInvocationId,
    interaction_id: InteractionId,
    seq: u32,
    tool_name: ToolName,
    input: Value,
    outcome: Result<Value, String>,
    invoked_at: Timestamp,
    completed_at: Timestamp,
}

impl ToolInvocation {
    /// Records a completed call.
    ///
    /// `completed_at` is clamped so it never precedes `invoked_at`.
    pub fn record(
        interaction_id: InteractionId,
        seq: u32,
        tool_name: ToolName,
        input: Value,
        outcome: Result<Value, String>,
        invoked_at: Timestamp,
        completed_at: Timestamp,
    ) -> Self {
        Self {
            id: ToolInvocationId::new(),
            interaction_id,
            seq,
            tool_name,
            input,
            outcome,
            invoked_at,
            completed_at: completed_at.max(invoked_at),
        }
    }

    /// Reconstitutes a stored invocation without validation.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: ToolInvocationId,
        interaction_id: InteractionId,
        seq: u32,
        tool_name: ToolName,
        input: Value,
        outcome: Result<Value, String>,
        invoked_at: Timestamp,
        completed_at: Timestamp,
    ) -> Self {
        Self {
            id,
            interaction_id,
            seq,
            tool_name,
            input,
            outcome,
            invoked_at,
            completed_at,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Getters
    // ═══════════════════════════════════════════════════════════════════════

    pub fn id(&self) -> ToolInvocationId {
        self.id
    }

    pub fn interaction_id(&self) -> InteractionId {
        self.interaction_id
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn tool_name(&self) -> ToolName {
        self.tool_name
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn output(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn invoked_at(&self) -> Timestamp {
        self.invoked_at
    }

    pub fn completed_at(&self) -> Timestamp {
        self.completed_at
    }

    /// Execution duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.completed_at
            .duration_since(&self.invoked_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
