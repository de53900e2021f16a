//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Reasoning
//!
//! - `AIProvider` - Chat completion against an external model
//!
//! ## Data
//!
//! - `QueryExecutor` - Reads and parameterized writes on business tables
//! - `SchemaIntrospector` - Table descriptions at startup
//! - `ContextRetriever` / `Embedder` / `VectorIndex` - Document retrieval
//!
//! ## Bookkeeping
//!
//! - `InteractionLog` - Append-only audit trail
//! - `ApprovalStore` - Mutations awaiting approval
//! - `ConversationStore` - Message history

mod ai_provider;
mod approval_store;
mod context_retriever;
mod conversation_store;
mod interaction_log;
mod query_executor;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, TokenUsage,
};
pub use approval_store::{ApprovalError, ApprovalStore};
pub use context_retriever::{ContextRetriever, Embedder, RetrievalError, RetrievalMode, VectorIndex};
pub use conversation_store::{ConversationError, ConversationStore};
pub use interaction_log::{AuditError, InteractionLog};
pub use query_executor::{ExecutorError, QueryExecutor, SchemaIntrospector};
