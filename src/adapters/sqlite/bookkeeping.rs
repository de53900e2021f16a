//! Tables the copilot owns inside the business database.
//!
//! Created idempotently at startup. Business tables are never migrated; these
//! are excluded from every domain schema.

use sqlx::SqlitePool;

/// Names of the copilot's own tables.
pub const BOOKKEEPING_TABLES: &[&str] = &[
    "audit_interactions",
    "audit_tool_invocations",
    "approval_requests",
    "chat_conversations",
    "chat_messages",
];

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS audit_interactions (
        id TEXT PRIMARY KEY,
        conversation_id INTEGER,
        input_text TEXT NOT NULL,
        domain TEXT,
        action TEXT,
        response TEXT NOT NULL,
        outcome TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_tool_invocations (
        id TEXT PRIMARY KEY,
        interaction_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        tool_name TEXT NOT NULL,
        input_json TEXT NOT NULL,
        output_json TEXT,
        error TEXT,
        invoked_at TEXT NOT NULL,
        completed_at TEXT NOT NULL,
        UNIQUE (interaction_id, seq)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS approval_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        action TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        amount REAL,
        threshold REAL NOT NULL,
        fingerprint TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        requested_by TEXT NOT NULL,
        interaction_id TEXT NOT NULL,
        decided_by TEXT,
        created_at TEXT NOT NULL,
        decided_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS approval_requests_pending_fingerprint
        ON approval_requests (fingerprint) WHERE status = 'pending'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL REFERENCES chat_conversations (id),
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

/// Creates the bookkeeping tables if they do not exist.
pub async fn ensure_bookkeeping_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// True for tables the copilot owns.
pub fn is_bookkeeping_table(name: &str) -> bool {
    BOOKKEEPING_TABLES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connect_in_memory;

    #[tokio::test]
    async fn creation_is_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        ensure_bookkeeping_tables(&pool).await.unwrap();
        ensure_bookkeeping_tables(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('audit_interactions', 'audit_tool_invocations', 'approval_requests', \
              'chat_conversations', 'chat_messages')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn recognizes_own_tables() {
        assert!(is_bookkeeping_table("AUDIT_INTERACTIONS"));
        assert!(!is_bookkeeping_table("orders"));
    }
}
