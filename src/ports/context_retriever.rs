//! Context Retriever Port - ranked document snippets for a query.
//!
//! Two implementations satisfy the same contract: an embedding-backed
//! nearest-neighbor search and a deterministic keyword fallback. Callers
//! cannot tell them apart except through [`ContextRetriever::mode`].

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::retrieval::{RetrievedContext, SearchRequest, Snippet};
use crate::domain::routing::BusinessDomain;

/// Port for context retrieval.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns at most `request.k` snippets, best match first.
    async fn search(&self, request: &SearchRequest) -> Result<RetrievedContext, RetrievalError>;

    /// Which path serves searches.
    fn mode(&self) -> RetrievalMode;
}

/// Port for turning text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Port for a persistent nearest-neighbor index, read-shared across turns.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `k` nearest chunks of `domain`'s collection to `vector`, scored by
    /// similarity.
    async fn nearest(
        &self,
        domain: BusinessDomain,
        vector: &[f32],
        k: usize,
        tags: &[String],
    ) -> Result<Vec<Snippet>, RetrievalError>;

    /// Number of indexed chunks.
    async fn len(&self) -> Result<u64, RetrievalError>;
}

/// Retrieval path in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Vector,
    Keyword,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Vector => "vector",
            RetrievalMode::Keyword => "keyword",
        }
    }
}

/// Retrieval errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index error: {0}")]
    Index(String),

    #[error("document store error: {0}")]
    Documents(String),
}
