//! Persistent vector index in its own SQLite file.
//!
//! Chunks live in an `embeddings` table with the vector stored as a JSON
//! array. Search is exhaustive cosine similarity over the domain's
//! collection, which is adequate for the document volumes of a single ERP.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::domain::retrieval::{cosine_similarity, RetrievedContext, SearchRequest, Snippet};
use crate::domain::routing::BusinessDomain;
use crate::ports::{RetrievalError, VectorIndex};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        source_id TEXT NOT NULL,
        chunk TEXT NOT NULL,
        vector TEXT NOT NULL,
        tags TEXT
    )
"#;

/// SQLite-file-backed nearest-neighbor index.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

fn index_err(e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::Index(e.to_string())
}

impl SqliteVectorIndex {
    /// Opens an existing index file. A missing file is an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        Self::connect(path.as_ref(), false).await
    }

    /// Opens or creates an index file, creating the table if needed.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let index = Self::connect(path.as_ref(), true).await?;
        sqlx::query(CREATE_TABLE)
            .execute(&index.pool)
            .await
            .map_err(index_err)?;
        Ok(index)
    }

    async fn connect(path: &Path, create_if_missing: bool) -> Result<Self, RetrievalError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(index_err)?;
        Ok(Self { pool })
    }

    /// Adds one chunk to `domain`'s collection.
    pub async fn insert(
        &self,
        domain: BusinessDomain,
        source_id: &str,
        chunk: &str,
        vector: &[f32],
        tags: Option<&str>,
    ) -> Result<(), RetrievalError> {
        let vector = serde_json::to_string(vector).map_err(index_err)?;
        sqlx::query(
            "INSERT INTO embeddings (domain, source_id, chunk, vector, tags) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(domain.tag())
        .bind(source_id)
        .bind(chunk)
        .bind(vector)
        .bind(tags)
        .execute(&self.pool)
        .await
        .map_err(index_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn nearest(
        &self,
        domain: BusinessDomain,
        vector: &[f32],
        k: usize,
        tags: &[String],
    ) -> Result<Vec<Snippet>, RetrievalError> {
        let rows = sqlx::query("SELECT source_id, chunk, vector, tags FROM embeddings WHERE domain = ?")
            .bind(domain.tag())
            .fetch_all(&self.pool)
            .await
            .map_err(index_err)?;

        let filter = SearchRequest::new("", domain, k).with_tags(tags.iter().cloned());
        let mut snippets = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_tags: Option<String> = row.try_get("tags").map_err(index_err)?;
            if !filter.accepts_tags(chunk_tags.as_deref()) {
                continue;
            }
            let raw: String = row.try_get("vector").map_err(index_err)?;
            let stored: Vec<f32> = serde_json::from_str(&raw).map_err(index_err)?;
            snippets.push(Snippet::new(
                row.try_get::<String, _>("chunk").map_err(index_err)?,
                cosine_similarity(vector, &stored),
                row.try_get::<String, _>("source_id").map_err(index_err)?,
            ));
        }

        Ok(RetrievedContext::ranked(snippets, k).snippets().to_vec())
    }

    async fn len(&self) -> Result<u64, RetrievalError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await
            .map_err(index_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
