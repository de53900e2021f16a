//! Context retrieval configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// SQLite file holding document embeddings. Without it the keyword
    /// fallback over the `documents` table is used.
    #[serde(default)]
    pub vector_index_path: Option<PathBuf>,

    /// Embedding endpoint; defaults to `ai.base_url`.
    #[serde(default)]
    pub embedding_base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Snippets requested per retrieval.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Characters kept of each snippet.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl RetrievalConfig {
    /// Embedding endpoint, falling back to the chat endpoint.
    pub fn embedding_base_url<'a>(&'a self, ai_base_url: &'a str) -> &'a str {
        self.embedding_base_url.as_deref().unwrap_or(ai_base_url)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_k == 0 {
            return Err(ValidationError::InvalidRetrievalK);
        }
        if self.excerpt_chars == 0 {
            return Err(ValidationError::InvalidExcerptLength);
        }
        if let Some(url) = &self.embedding_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl("retrieval.embedding_base_url"));
            }
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_index_path: None,
            embedding_base_url: None,
            embedding_model: default_embedding_model(),
            default_k: default_k(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_k() -> usize {
    3
}

fn default_excerpt_chars() -> usize {
    200
}
