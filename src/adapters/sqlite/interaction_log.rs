//! SQLite implementation of InteractionLog.
//!
//! Appends to `audit_interactions` and `audit_tool_invocations`. Rows are
//! never updated or deleted by the copilot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::audit::{Interaction, ToolInvocation, ToolName};
use crate::domain::foundation::{ConversationId, InteractionId, Timestamp, ToolInvocationId};
use crate::ports::{AuditError, InteractionLog};

/// SQLite-backed audit trail.
#[derive(Clone)]
pub struct SqliteInteractionLog {
    pool: SqlitePool,
}

impl SqliteInteractionLog {
    /// Creates a new SqliteInteractionLog.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionLog for SqliteInteractionLog {
    async fn append_invocation(&self, invocation: &ToolInvocation) -> Result<(), AuditError> {
        let input = serde_json::to_string(invocation.input())
            .map_err(|e| AuditError::Storage(format!("Failed to encode input: {}", e)))?;
        let output = invocation
            .output()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AuditError::Storage(format!("Failed to encode output: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO audit_tool_invocations (
                id, interaction_id, seq, tool_name, input_json, output_json, error,
                invoked_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invocation.id().to_string())
        .bind(invocation.interaction_id().to_string())
        .bind(i64::from(invocation.seq()))
        .bind(invocation.tool_name().as_str())
        .bind(input)
        .bind(output)
        .bind(invocation.error())
        .bind(invocation.invoked_at().as_datetime())
        .bind(invocation.completed_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("Failed to insert tool invocation: {}", e)))?;

        Ok(())
    }

    async fn append_interaction(&self, interaction: &Interaction) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_interactions (
                id, conversation_id, input_text, domain, action, response, outcome, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(interaction.id().to_string())
        .bind(interaction.conversation_id().map(|c| c.as_i64()))
        .bind(interaction.input_text())
        .bind(interaction.domain().map(|d| d.tag()))
        .bind(interaction.action())
        .bind(interaction.response())
        .bind(interaction.outcome().as_str())
        .bind(interaction.created_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("Failed to insert interaction: {}", e)))?;

        Ok(())
    }

    async fn find_interaction(
        &self,
        id: InteractionId,
    ) -> Result<Option<Interaction>, AuditError> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, input_text, domain, action, response, outcome, created_at
            FROM audit_interactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("Failed to fetch interaction: {}", e)))?;

        row.as_ref().map(row_to_interaction).transpose()
    }

    async fn invocations_for(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Vec<ToolInvocation>, AuditError> {
        let rows = sqlx::query(
            r#"
            SELECT id, interaction_id, seq, tool_name, input_json, output_json, error,
                   invoked_at, completed_at
            FROM audit_tool_invocations
            WHERE interaction_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(interaction_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(format!("Failed to fetch tool invocations: {}", e)))?;

        rows.iter().map(row_to_invocation).collect()
    }
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> AuditError {
    AuditError::Corrupt(format!("{what}: {e}"))
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, AuditError> {
    let raw: String = row.try_get(column).map_err(|e| corrupt(column, e))?;
    Uuid::parse_str(&raw).map_err(|e| corrupt(column, e))
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp, AuditError> {
    let dt: DateTime<Utc> = row.try_get(column).map_err(|e| corrupt(column, e))?;
    Ok(Timestamp::from_datetime(dt))
}

fn row_to_interaction(row: &SqliteRow) -> Result<Interaction, AuditError> {
    let domain: Option<String> = row.try_get("domain").map_err(|e| corrupt("domain", e))?;
    let domain = domain
        .map(|d| d.parse().map_err(|e| corrupt("domain", e)))
        .transpose()?;
    let outcome: String = row.try_get("outcome").map_err(|e| corrupt("outcome", e))?;
    let conversation_id: Option<i64> = row
        .try_get("conversation_id")
        .map_err(|e| corrupt("conversation_id", e))?;

    Ok(Interaction::new(
        InteractionId::from_uuid(parse_uuid(row, "id")?),
        conversation_id.map(ConversationId::new),
        row.try_get::<String, _>("input_text")
            .map_err(|e| corrupt("input_text", e))?,
        domain,
        row.try_get::<Option<String>, _>("action")
            .map_err(|e| corrupt("action", e))?,
        row.try_get::<String, _>("response")
            .map_err(|e| corrupt("response", e))?,
        outcome.parse().map_err(|e| corrupt("outcome", e))?,
        timestamp(row, "created_at")?,
    ))
}

fn row_to_invocation(row: &SqliteRow) -> Result<ToolInvocation, AuditError> {
    let tool_name: String = row.try_get("tool_name").map_err(|e| corrupt("tool_name", e))?;
    let tool_name: ToolName = tool_name.parse().map_err(|e| corrupt("tool_name", e))?;

    let input: String = row.try_get("input_json").map_err(|e| corrupt("input_json", e))?;
    let input = serde_json::from_str(&input).map_err(|e| corrupt("input_json", e))?;

    let output: Option<String> = row.try_get("output_json").map_err(|e| corrupt("output_json", e))?;
    let error: Option<String> = row.try_get("error").map_err(|e| corrupt("error", e))?;
    let outcome = match (output, error) {
        (_, Some(error)) => Err(error),
        (Some(output), None) => Ok(serde_json::from_str(&output).map_err(|e| corrupt("output_json", e))?),
        (None, None) => Ok(serde_json::Value::Null),
    };

    let seq: i64 = row.try_get("seq").map_err(|e| corrupt("seq", e))?;

    Ok(ToolInvocation::reconstitute(
        ToolInvocationId::from_uuid(parse_uuid(row, "id")?),
        InteractionId::from_uuid(parse_uuid(row, "interaction_id")?),
        u32::try_from(seq).map_err(|e| corrupt("seq", e))?,
        tool_name,
        input,
        outcome,
        timestamp(row, "invoked_at")?,
        timestamp(row, "completed_at")?,
    ))
}
