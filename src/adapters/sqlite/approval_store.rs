//! SQLite implementation of ApprovalStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::approval::{ApprovalStatus, NewPendingMutation, PendingMutation, Submission};
use crate::domain::foundation::{ApprovalId, InteractionId, Timestamp};
use crate::ports::{ApprovalError, ApprovalStore};

const SELECT_COLUMNS: &str = r#"
    SELECT id, domain, action, payload_json, amount, threshold, fingerprint, status,
           requested_by, interaction_id, decided_by, created_at, decided_at
    FROM approval_requests
"#;

/// Pending mutations in the `approval_requests` table.
#[derive(Clone)]
pub struct SqliteApprovalStore {
    pool: SqlitePool,
}

impl SqliteApprovalStore {
    /// Creates a new SqliteApprovalStore.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: ApprovalId) -> Result<Option<PendingMutation>, ApprovalError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(row_to_pending).transpose()
    }
}

#[async_trait]
impl ApprovalStore for SqliteApprovalStore {
    async fn submit(&self, request: NewPendingMutation) -> Result<Submission, ApprovalError> {
        let payload = serde_json::to_string(&request.payload)
            .map_err(|e| ApprovalError::Storage(format!("Failed to encode payload: {}", e)))?;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let existing = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE fingerprint = ? AND status = 'pending'"
        ))
        .bind(&request.fingerprint)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        if let Some(row) = existing {
            tx.commit().await.map_err(storage)?;
            return Ok(Submission::Existing(row_to_pending(&row)?));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO approval_requests (
                domain, action, payload_json, amount, threshold, fingerprint, status,
                requested_by, interaction_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(request.domain.tag())
        .bind(&request.action)
        .bind(payload)
        .bind(request.amount)
        .bind(request.threshold)
        .bind(&request.fingerprint)
        .bind(&request.requested_by)
        .bind(request.interaction_id.to_string())
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        let id = ApprovalId::new(result.last_insert_rowid());
        tracing::info!(approval_id = %id, action = %request.action, "mutation held for approval");

        self.fetch(id)
            .await?
            .map(Submission::Created)
            .ok_or(ApprovalError::NotFound(id))
    }

    async fn find(&self, id: ApprovalId) -> Result<Option<PendingMutation>, ApprovalError> {
        self.fetch(id).await
    }

    async fn list_pending(&self) -> Result<Vec<PendingMutation>, ApprovalError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_pending).collect()
    }

    async fn decide(
        &self,
        id: ApprovalId,
        status: ApprovalStatus,
        decided_by: &str,
    ) -> Result<PendingMutation, ApprovalError> {
        let result = sqlx::query(
            r#"
            UPDATE approval_requests
            SET status = ?, decided_by = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(decided_by)
        .bind(Timestamp::now().as_datetime())
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let current = self.fetch(id).await?.ok_or(ApprovalError::NotFound(id))?;
        if result.rows_affected() == 0 {
            return Err(ApprovalError::AlreadyDecided {
                id,
                status: current.status,
            });
        }
        Ok(current)
    }
}

fn storage(e: sqlx::Error) -> ApprovalError {
    ApprovalError::Storage(e.to_string())
}

fn corrupt(column: &str, e: impl std::fmt::Display) -> ApprovalError {
    ApprovalError::Storage(format!("corrupt {column}: {e}"))
}

fn row_to_pending(row: &SqliteRow) -> Result<PendingMutation, ApprovalError> {
    let domain: String = row.try_get("domain").map_err(storage)?;
    let payload: String = row.try_get("payload_json").map_err(storage)?;
    let status: String = row.try_get("status").map_err(storage)?;
    let interaction_id: String = row.try_get("interaction_id").map_err(storage)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage)?;
    let decided_at: Option<DateTime<Utc>> = row.try_get("decided_at").map_err(storage)?;

    Ok(PendingMutation {
        id: ApprovalId::new(row.try_get("id").map_err(storage)?),
        domain: domain.parse().map_err(|e| corrupt("domain", e))?,
        action: row.try_get("action").map_err(storage)?,
        payload: serde_json::from_str(&payload).map_err(|e| corrupt("payload_json", e))?,
        amount: row.try_get("amount").map_err(storage)?,
        threshold: row.try_get("threshold").map_err(storage)?,
        fingerprint: row.try_get("fingerprint").map_err(storage)?,
        status: status.parse().map_err(|e| corrupt("status", e))?,
        requested_by: row.try_get("requested_by").map_err(storage)?,
        interaction_id: InteractionId::from_uuid(
            Uuid::parse_str(&interaction_id).map_err(|e| corrupt("interaction_id", e))?,
        ),
        decided_by: row.try_get("decided_by").map_err(storage)?,
        created_at: Timestamp::from_datetime(created_at),
        decided_at: decided_at.map(Timestamp::from_datetime),
    })
}
