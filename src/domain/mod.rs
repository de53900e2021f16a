//! Domain layer containing the copilot's rules and types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps)
//! - `routing` - Business domains, action catalogs and intents
//! - `schema` - Table descriptions supplied to query synthesis
//! - `safety` - Statement guard for synthesized SQL
//! - `mutation` - Validated single-row inserts
//! - `approval` - Thresholds and pending mutations
//! - `audit` - Interactions and tool invocations
//! - `retrieval` - Retrieved context and scoring
//! - `prompt` - Prompt specifications
//! - `formatting` - Deterministic response text
//! - `errors` - Turn error taxonomy

pub mod approval;
pub mod audit;
pub mod errors;
pub mod formatting;
pub mod foundation;
pub mod mutation;
pub mod prompt;
pub mod query;
pub mod retrieval;
pub mod routing;
pub mod safety;
pub mod schema;
