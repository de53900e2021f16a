//! Routing module - domains, their action enumerations and intents.

mod action;
mod business_domain;
mod catalog;
mod intent;

pub use action::{ActionKind, ActionSpec};
pub use business_domain::{BusinessDomain, UnknownDomain};
pub use catalog::{DomainCatalog, DomainConfig};
pub use intent::{Intent, IntentParseError};
