//! Per-turn audit recorder.
//!
//! Wraps every tool call of one interaction, numbers it, and appends the
//! resulting [`ToolInvocation`] as soon as the call returns. Sequence numbers
//! follow completion order; timestamps never go backwards within a turn.

use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::domain::audit::{ToolInvocation, ToolName};
use crate::domain::foundation::{InteractionId, Timestamp};
use crate::ports::{AuditError, InteractionLog};

struct RecorderState {
    /// Sequence numbers start at 1.
    next_seq: u32,
    last_invoked: Option<Timestamp>,
    last_completed: Option<Timestamp>,
    action: Option<String>,
    failure: Option<AuditError>,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self {
            next_seq: 1,
            last_invoked: None,
            last_completed: None,
            action: None,
            failure: None,
        }
    }
}

pub struct TurnRecorder {
    log: Arc<dyn InteractionLog>,
    interaction_id: InteractionId,
    state: Mutex<RecorderState>,
}

impl TurnRecorder {
    pub fn new(log: Arc<dyn InteractionLog>, interaction_id: InteractionId) -> Self {
        Self {
            log,
            interaction_id,
            state: Mutex::new(RecorderState::default()),
        }
    }

    pub fn interaction_id(&self) -> InteractionId {
        self.interaction_id
    }

    /// Runs `call`, records it as `tool`, and hands its result back
    /// unchanged. `output` renders a success for the audit trail.
    pub async fn record<T, E, F>(
        &self,
        tool: ToolName,
        input: Value,
        call: F,
        output: impl FnOnce(&T) -> Value,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let invoked_at = Timestamp::now();
        let result = call.await;
        let outcome = match &result {
            Ok(value) => Ok(output(value)),
            Err(e) => Err(e.to_string()),
        };
        self.append(tool, input, outcome, invoked_at).await;
        result
    }

    /// Records a step that ran synchronously, such as a statement check.
    pub async fn note(&self, tool: ToolName, input: Value, outcome: Result<Value, String>) {
        self.append(tool, input, outcome, Timestamp::now()).await;
    }

    /// Remembers the action the turn resolved to.
    pub fn set_action(&self, action: &str) {
        self.lock().action = Some(action.to_string());
    }

    pub fn action(&self) -> Option<String> {
        self.lock().action.clone()
    }

    /// Number of invocations recorded so far.
    pub fn invocation_count(&self) -> u32 {
        self.lock().next_seq - 1
    }

    /// The first append failure of the turn, if any.
    pub fn failure(&self) -> Option<AuditError> {
        self.lock().failure.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn append(
        &self,
        tool: ToolName,
        input: Value,
        outcome: Result<Value, String>,
        invoked_at: Timestamp,
    ) {
        let invocation = {
            let mut state = self.lock();
            let invoked_at = state.last_invoked.map_or(invoked_at, |t| invoked_at.max(t));
            let floor = state.last_completed.map_or(invoked_at, |t| invoked_at.max(t));
            let completed_at = Timestamp::now_not_before(floor);

            let seq = state.next_seq;
            state.next_seq += 1;
            state.last_invoked = Some(invoked_at);
            state.last_completed = Some(completed_at);

            ToolInvocation::record(
                self.interaction_id,
                seq,
                tool,
                input,
                outcome,
                invoked_at,
                completed_at,
            )
        };

        tracing::debug!(
            interaction_id = %self.interaction_id,
            seq = invocation.seq(),
            tool = tool.as_str(),
            success = invocation.is_success(),
            "tool invocation"
        );

        if let Err(e) = self.log.append_invocation(&invocation).await {
            tracing::error!(interaction_id = %self.interaction_id, error = %e, "audit append failed");
            self.lock().failure.get_or_insert(e);
        }
    }
}
