//! Keyword fallback over the flat `documents` table.
//!
//! Used when no embedding index is available. Each document row carries a
//! `path` that is either a file on disk or the document text itself. Scores
//! are naive term frequency; a document with no query term is not a match.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::domain::query::Row;
use crate::domain::retrieval::{excerpt, query_terms, term_frequency, RetrievedContext, SearchRequest, Snippet};
use crate::ports::{ContextRetriever, QueryExecutor, RetrievalError, RetrievalMode};

/// Term-frequency search over `documents(id, module, path, tags)`.
pub struct KeywordRetriever {
    executor: Arc<dyn QueryExecutor>,
    excerpt_chars: usize,
}

impl KeywordRetriever {
    pub fn new(executor: Arc<dyn QueryExecutor>, excerpt_chars: usize) -> Self {
        Self {
            executor,
            excerpt_chars,
        }
    }

    async fn document_text(path_or_text: &str) -> String {
        let path = Path::new(path_or_text);
        if path.is_file() {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "document file unreadable");
                    return String::new();
                }
            }
        }
        path_or_text.to_string()
    }
}

fn text_column(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ContextRetriever for KeywordRetriever {
    async fn search(&self, request: &SearchRequest) -> Result<RetrievedContext, RetrievalError> {
        let terms = query_terms(&request.query);
        if terms.is_empty() || request.k == 0 {
            return Ok(RetrievedContext::empty());
        }

        // The module tag comes from a closed enum, never from user text.
        let statement = format!(
            "SELECT id, path, tags FROM documents WHERE lower(module) = '{}' ORDER BY id",
            request.domain.tag()
        );
        let rows = self
            .executor
            .read(&statement)
            .await
            .map_err(|e| RetrievalError::Documents(e.to_string()))?;

        let mut snippets = Vec::new();
        for row in &rows {
            if !request.accepts_tags(text_column(row, "tags").as_deref()) {
                continue;
            }
            let Some(source_id) = text_column(row, "id") else {
                continue;
            };
            let Some(path) = text_column(row, "path") else {
                continue;
            };

            let text = Self::document_text(&path).await;
            let score = term_frequency(&terms, &text);
            if score > 0.0 {
                snippets.push(Snippet::new(excerpt(&text, self.excerpt_chars), score, source_id));
            }
        }

        tracing::debug!(
            domain = %request.domain,
            scanned = rows.len(),
            matched = snippets.len(),
            "keyword search"
        );
        Ok(RetrievedContext::ranked(snippets, request.k))
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Keyword
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connect_in_memory, SqliteQueryExecutor};
    use crate::domain::routing::BusinessDomain;
    use proptest::prelude::*;

    async fn retriever_with(docs: &[(&str, &str, &str, Option<&str>)]) -> KeywordRetriever {
        let pool = connect_in_memory().await.unwrap();
        sqlx::query("CREATE TABLE documents (id TEXT PRIMARY KEY, module TEXT, path TEXT, tags TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for (id, module, path, tags) in docs {
            sqlx::query("INSERT INTO documents (id, module, path, tags) VALUES (?, ?, ?, ?)")
                .bind(id)
                .bind(module)
                .bind(path)
                .bind(tags)
                .execute(&pool)
                .await
                .unwrap();
        }
        KeywordRetriever::new(Arc::new(SqliteQueryExecutor::new(pool)), 200)
    }

    #[tokio::test]
    async fn ranks_by_term_frequency_within_domain() {
        let retriever = retriever_with(&[
            ("returns", "sales", "Returns are accepted within 30 days. Returns need a receipt.", None),
            ("shipping", "sales", "Shipping takes five days. Late returns ship back.", None),
            ("unrelated", "sales", "Office hours are nine to five.", None),
            ("finance-returns", "finance", "returns returns returns", None),
        ])
        .await;

        let context = retriever
            .search(&SearchRequest::new("how do returns work", BusinessDomain::Sales, 3))
            .await
            .unwrap();

        let ids: Vec<_> = context.snippets().iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, vec!["returns", "shipping"]);
        assert_eq!(context.snippets()[0].score, 2.0);
        assert_eq!(retriever.mode(), RetrievalMode::Keyword);
    }

    #[tokio::test]
    async fn reads_documents_from_disk_and_trims_excerpt() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.txt");
        std::fs::write(&file, format!("Refund policy. {}", "x".repeat(500))).unwrap();
        let path = file.to_string_lossy().to_string();

        let retriever = retriever_with(&[("policy", "finance", &path, Some("policy,finance"))]).await;
        let context = retriever
            .search(&SearchRequest::new("refund policy", BusinessDomain::Finance, 3))
            .await
            .unwrap();

        let snippet = &context.snippets()[0];
        assert!(snippet.text.starts_with("Refund policy."));
        assert!(snippet.text.ends_with("..."));
        assert_eq!(snippet.text.chars().count(), 203);
    }

    #[tokio::test]
    async fn honours_tag_filter() {
        let retriever = retriever_with(&[
            ("policy", "finance", "late payment policy", Some("policy")),
            ("contract", "finance", "late payment clause", Some("contract")),
        ])
        .await;

        let request = SearchRequest::new("late payment", BusinessDomain::Finance, 3).with_tags(["policy"]);
        let context = retriever.search(&request).await.unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context.snippets()[0].source_id, "policy");
    }

    #[tokio::test]
    async fn missing_documents_table_is_a_documents_error() {
        let pool = connect_in_memory().await.unwrap();
        let retriever = KeywordRetriever::new(Arc::new(SqliteQueryExecutor::new(pool)), 200);
        let result = retriever
            .search(&SearchRequest::new("anything", BusinessDomain::Sales, 3))
            .await;
        assert!(matches!(result, Err(RetrievalError::Documents(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn never_exceeds_k_and_orders_best_first(k in 0usize..6, copies in proptest::collection::vec(1usize..5, 1..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let texts: Vec<String> = copies.iter().map(|n| "invoice ".repeat(*n)).collect();
                let ids: Vec<String> = (0..texts.len()).map(|i| format!("doc-{i}")).collect();
                let docs: Vec<_> = ids
                    .iter()
                    .zip(&texts)
                    .map(|(id, text)| (id.as_str(), "finance", text.as_str(), None))
                    .collect();
                let retriever = retriever_with(&docs).await;

                let context = retriever
                    .search(&SearchRequest::new("invoice", BusinessDomain::Finance, k))
                    .await
                    .unwrap();

                prop_assert!(context.len() <= k);
                prop_assert!(context.snippets().windows(2).all(|w| w[0].score >= w[1].score));
                Ok(())
            })?;
        }
    }
}
