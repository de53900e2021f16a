//! Query Executor Port - the only component touching business data.
//!
//! Each call is its own unit of work; there is no implicit batching across
//! calls. Writes are always parameterized. The executor trusts its caller:
//! allowlist enforcement happens in the pipeline before a statement gets here.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::query::{Row, SqlValue, WriteOutcome};
use crate::domain::schema::DomainSchema;

/// Port for running statements against the relational store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a read statement and return every row.
    async fn read(&self, statement: &str) -> Result<Vec<Row>, ExecutorError>;

    /// Run a parameterized read statement.
    async fn read_with(&self, statement: &str, params: &[SqlValue])
        -> Result<Vec<Row>, ExecutorError>;

    /// Run a parameterized write statement.
    async fn write(&self, statement: &str, params: &[SqlValue])
        -> Result<WriteOutcome, ExecutorError>;
}

/// Port for describing the tables present at startup.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Describe every user table (internal bookkeeping tables excluded).
    async fn introspect(&self) -> Result<DomainSchema, ExecutorError>;
}

/// Errors from the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The store rejected the statement (syntax, constraint, missing column).
    #[error("{0}")]
    Statement(String),

    /// The connection could not be used.
    #[error("database connection error: {0}")]
    Connection(String),

    /// A returned value could not be decoded.
    #[error("could not decode column {column}: {message}")]
    Decode { column: String, message: String },
}
