//! SQLite implementation of SchemaIntrospector.
//!
//! Reads `sqlite_master` for table names and the `pragma_table_info` /
//! `pragma_foreign_key_list` table-valued functions for columns and
//! relationships. Nothing is migrated; whatever exists at startup is what
//! the domains see.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::schema::{ColumnSchema, DomainSchema, TableSchema};
use crate::ports::{ExecutorError, SchemaIntrospector};

use super::bookkeeping::is_bookkeeping_table;
use super::query_executor::map_sqlx_error;

/// Describes the tables of the shared SQLite database.
#[derive(Clone)]
pub struct SqliteSchemaIntrospector {
    pool: SqlitePool,
}

impl SqliteSchemaIntrospector {
    /// Creates a new SqliteSchemaIntrospector.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn describe(&self, table: &str) -> Result<TableSchema, ExecutorError> {
        let column_rows = sqlx::query(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let columns = column_rows
            .iter()
            .map(|row| {
                let mut column =
                    ColumnSchema::new(row.get::<String, _>("name"), row.get::<String, _>("type"));
                if row.get::<i64, _>("notnull") != 0 {
                    column = column.not_null();
                }
                if row.get::<i64, _>("pk") != 0 {
                    column = column.primary_key();
                }
                column
            })
            .collect();

        let fk_rows = sqlx::query(
            r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut schema = TableSchema::new(table, columns);
        for row in &fk_rows {
            // "to" is NULL when the reference targets the parent's primary key.
            let to: Option<String> = row.get("to");
            schema = schema.with_foreign_key(
                row.get::<String, _>("from"),
                row.get::<String, _>("table"),
                to.unwrap_or_else(|| "id".to_string()),
            );
        }
        Ok(schema)
    }
}

#[async_trait]
impl SchemaIntrospector for SqliteSchemaIntrospector {
    async fn introspect(&self) -> Result<DomainSchema, ExecutorError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !is_bookkeeping_table(n)) {
            tables.push(self.describe(name).await?);
        }

        tracing::debug!(tables = tables.len(), "introspected schema");
        Ok(DomainSchema::new(tables))
    }
}
