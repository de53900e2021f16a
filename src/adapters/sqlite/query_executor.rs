//! SQLite implementation of QueryExecutor.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

use crate::domain::query::{Row, SqlValue, WriteOutcome};
use crate::ports::{ExecutorError, QueryExecutor};

/// Runs statements on the shared SQLite pool.
#[derive(Clone)]
pub struct SqliteQueryExecutor {
    pool: SqlitePool,
}

impl SqliteQueryExecutor {
    /// Creates a new SqliteQueryExecutor.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn read(&self, statement: &str) -> Result<Vec<Row>, ExecutorError> {
        self.read_with(statement, &[]).await
    }

    async fn read_with(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>, ExecutorError> {
        let rows = bind_all(sqlx::query(statement), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_json).collect()
    }

    async fn write(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<WriteOutcome, ExecutorError> {
        let result = bind_all(sqlx::query(statement), params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let rows_affected = result.rows_affected();
        Ok(WriteOutcome {
            rows_affected,
            last_insert_id: (rows_affected > 0).then(|| result.last_insert_rowid()),
        })
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

/// Decodes a row by the runtime storage class of each value.
fn row_to_json(row: &SqliteRow) -> Result<Row, ExecutorError> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let decode_err = |e: sqlx::Error| ExecutorError::Decode {
            column: column.name().to_string(),
            message: e.to_string(),
        };

        let raw = row.try_get_raw(i).map_err(decode_err)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => {
                    Value::from(row.try_get_unchecked::<i64, _>(i).map_err(decode_err)?)
                }
                "REAL" | "NUMERIC" => {
                    let f = row.try_get_unchecked::<f64, _>(i).map_err(decode_err)?;
                    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(i).map_err(decode_err)?;
                    Value::String(format!("<{} bytes>", bytes.len()))
                }
                _ => Value::String(row.try_get_unchecked::<String, _>(i).map_err(decode_err)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> ExecutorError {
    match err {
        sqlx::Error::Database(db) => ExecutorError::Statement(db.message().to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ExecutorError::Connection(err.to_string())
        }
        other => ExecutorError::Statement(other.to_string()),
    }
}
