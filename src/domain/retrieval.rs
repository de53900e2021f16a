//! Retrieved context and the scoring rules shared by both retrieval paths.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::routing::BusinessDomain;

/// Query terms shorter than this carry no signal for keyword scoring.
const MIN_TERM_LEN: usize = 3;

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub text: String,
    pub score: f64,
    pub source_id: String,
}

impl Snippet {
    pub fn new(text: impl Into<String>, score: f64, source_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score,
            source_id: source_id.into(),
        }
    }
}

/// A context search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub domain: BusinessDomain,
    pub k: usize,
    /// When non-empty, only documents carrying one of these tags qualify.
    pub tags: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, domain: BusinessDomain, k: usize) -> Self {
        Self {
            query: query.into(),
            domain,
            k,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// True when a comma-separated tag column satisfies the filter.
    pub fn accepts_tags(&self, tag_column: Option<&str>) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let Some(column) = tag_column else {
            return false;
        };
        column
            .split(',')
            .map(|t| t.trim().to_ascii_lowercase())
            .any(|t| self.tags.iter().any(|want| want.eq_ignore_ascii_case(&t)))
    }
}

/// Ordered snippets, best match first, never more than the requested `k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RetrievedContext(Vec<Snippet>);

impl RetrievedContext {
    /// Orders `snippets` best-first and keeps at most `k`.
    ///
    /// Ties on score are broken by source id so both retrieval paths give the
    /// same order for the same scores.
    pub fn ranked(mut snippets: Vec<Snippet>, k: usize) -> Self {
        snippets.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        snippets.truncate(k);
        Self(snippets)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prompt block listing each snippet with its source.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] ({}) {}", i + 1, s.source_id, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lowercased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Distinct query terms used for keyword scoring.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(query)
        .into_iter()
        .filter(|w| w.chars().count() >= MIN_TERM_LEN)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Naive term-frequency score: total occurrences of the query terms among
/// the document's words. Zero means the document does not match.
pub fn term_frequency(terms: &[String], document: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    words(document)
        .iter()
        .filter(|w| terms.contains(w))
        .count() as f64
}

/// Cosine similarity of two vectors; zero when either is empty, zero-length
/// or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
