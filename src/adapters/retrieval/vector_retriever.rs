//! Primary retrieval path: embed the query, then nearest-neighbor search.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::retrieval::{excerpt, RetrievedContext, SearchRequest, Snippet};
use crate::ports::{ContextRetriever, Embedder, RetrievalError, RetrievalMode, VectorIndex};

pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    excerpt_chars: usize,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, excerpt_chars: usize) -> Self {
        Self {
            embedder,
            index,
            excerpt_chars,
        }
    }
}

#[async_trait]
impl ContextRetriever for VectorRetriever {
    async fn search(&self, request: &SearchRequest) -> Result<RetrievedContext, RetrievalError> {
        if request.k == 0 || request.query.trim().is_empty() {
            return Ok(RetrievedContext::empty());
        }

        let vector = self.embedder.embed(&request.query).await?;
        let hits = self
            .index
            .nearest(request.domain, &vector, request.k, &request.tags)
            .await?;

        let snippets = hits
            .into_iter()
            .map(|s| Snippet::new(excerpt(&s.text, self.excerpt_chars), s.score, s.source_id))
            .collect();
        Ok(RetrievedContext::ranked(snippets, request.k))
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Vector
    }
}
