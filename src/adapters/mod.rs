//! Adapters - Implementations of port interfaces.
//!
//! - `ai` - OpenAI-compatible chat completion and a scriptable mock
//! - `sqlite` - Business store, schema introspection and bookkeeping tables
//! - `retrieval` - Vector index, embedder and keyword fallback
//! - `http` - Inbound REST boundary (axum)

pub mod ai;
pub mod http;
pub mod retrieval;
pub mod sqlite;
