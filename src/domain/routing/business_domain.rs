//! Business domains a request can be routed to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed business areas served by the copilot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessDomain {
    Sales,
    Finance,
    Inventory,
    Analytics,
}

impl BusinessDomain {
    /// Every domain, in classification-prompt order.
    pub const ALL: [BusinessDomain; 4] = [
        BusinessDomain::Sales,
        BusinessDomain::Finance,
        BusinessDomain::Inventory,
        BusinessDomain::Analytics,
    ];

    /// Lowercase tag used in prompts, storage and configuration.
    pub fn tag(&self) -> &'static str {
        match self {
            BusinessDomain::Sales => "sales",
            BusinessDomain::Finance => "finance",
            BusinessDomain::Inventory => "inventory",
            BusinessDomain::Analytics => "analytics",
        }
    }

    /// Exact tag lookup (case-insensitive).
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.tag() == tag)
    }

    /// Interprets a raw classification reply.
    ///
    /// Only the first whitespace-delimited token counts, with surrounding
    /// punctuation stripped. Anything that is not one of the fixed tags yields
    /// `None`; callers substitute their configured default domain.
    pub fn from_classification(reply: &str) -> Option<Self> {
        let first = reply.split_whitespace().next()?;
        let token = first.trim_matches(|c: char| !c.is_alphanumeric());
        Self::from_tag(token)
    }
}

impl fmt::Display for BusinessDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error for a domain tag outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown business domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for BusinessDomain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| UnknownDomain(s.to_string()))
    }
}
