//! Routing configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::routing::BusinessDomain;

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Domain used when classification names no known domain
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// Messages of history supplied to classification and intent prompts
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl RoutingConfig {
    pub fn default_domain(&self) -> Result<BusinessDomain, ValidationError> {
        BusinessDomain::from_tag(&self.default_domain)
            .ok_or_else(|| ValidationError::UnknownDomain(self.default_domain.clone()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.default_domain().map(|_| ())
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            history_window: default_history_window(),
        }
    }
}

fn default_domain() -> String {
    "sales".to_string()
}

fn default_history_window() -> usize {
    5
}
