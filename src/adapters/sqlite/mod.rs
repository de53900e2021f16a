//! SQLite adapters.
//!
//! Business data, the audit trail, approval requests and conversation
//! history share one database file and one connection.

mod approval_store;
mod bookkeeping;
mod conversation_store;
mod interaction_log;
mod pool;
mod query_executor;
mod schema_introspector;

pub use approval_store::SqliteApprovalStore;
pub use bookkeeping::{ensure_bookkeeping_tables, is_bookkeeping_table, BOOKKEEPING_TABLES};
pub use conversation_store::SqliteConversationStore;
pub use interaction_log::SqliteInteractionLog;
pub use pool::{connect, connect_in_memory};
pub use query_executor::SqliteQueryExecutor;
pub use schema_introspector::SqliteSchemaIntrospector;
