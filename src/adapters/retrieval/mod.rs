//! Context retrieval adapters.
//!
//! [`select_retriever`] decides once, at startup, which path serves every
//! search: the vector index when it opens, holds chunks and the embedder
//! answers; otherwise the keyword fallback over the `documents` table.

mod embedder;
mod keyword_retriever;
mod vector_index;
mod vector_retriever;

pub use embedder::OpenAIEmbedder;
pub use keyword_retriever::KeywordRetriever;
pub use vector_index::SqliteVectorIndex;
pub use vector_retriever::VectorRetriever;

use std::path::Path;
use std::sync::Arc;

use crate::ports::{ContextRetriever, Embedder, QueryExecutor, VectorIndex};

/// Probe text sent to the embedder at startup.
const PROBE: &str = "availability probe";

/// Builds the context retriever for the process.
pub async fn select_retriever(
    index_path: Option<&Path>,
    embedder: Option<Arc<dyn Embedder>>,
    executor: Arc<dyn QueryExecutor>,
    excerpt_chars: usize,
) -> Arc<dyn ContextRetriever> {
    let fallback = |reason: String| -> Arc<dyn ContextRetriever> {
        tracing::warn!(%reason, "using keyword retrieval fallback");
        Arc::new(KeywordRetriever::new(executor.clone(), excerpt_chars))
    };

    let Some(path) = index_path else {
        return fallback("no vector index configured".into());
    };
    let Some(embedder) = embedder else {
        return fallback("no embedder configured".into());
    };

    let index = match SqliteVectorIndex::open(path).await {
        Ok(index) => index,
        Err(e) => return fallback(format!("vector index unavailable: {e}")),
    };
    match index.len().await {
        Ok(0) => return fallback("vector index is empty".into()),
        Ok(_) => {}
        Err(e) => return fallback(format!("vector index unreadable: {e}")),
    }
    if let Err(e) = embedder.embed(PROBE).await {
        return fallback(format!("embedder unavailable: {e}"));
    }

    tracing::info!(path = %path.display(), "using vector retrieval");
    Arc::new(VectorRetriever::new(embedder, Arc::new(index), excerpt_chars))
}
