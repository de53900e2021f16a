//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `ERP_COPILOT` prefix and
//! `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use erp_copilot::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod approvals;
mod database;
mod error;
mod logging;
mod retrieval;
mod routing;
mod server;

pub use ai::AiConfig;
pub use approvals::ApprovalsConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use retrieval::RetrievalConfig;
pub use routing::RoutingConfig;
pub use server::ServerConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Business store (the only section without a usable default)
    pub database: DatabaseConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub approvals: ApprovalsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `.env` when present, then `ERP_COPILOT__<SECTION>__<KEY>`
    /// variables:
    ///
    /// - `ERP_COPILOT__DATABASE__URL=sqlite:erp.db` -> `database.url`
    /// - `ERP_COPILOT__AI__BASE_URL=...` -> `ai.base_url`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ERP_COPILOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.ai.validate()?;
        self.retrieval.validate()?;
        self.routing.validate()?;
        self.approvals.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::BusinessDomain;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "ERP_COPILOT__DATABASE__URL",
        "ERP_COPILOT__SERVER__PORT",
        "ERP_COPILOT__AI__MODEL",
        "ERP_COPILOT__ROUTING__DEFAULT_DOMAIN",
        "ERP_COPILOT__APPROVALS__FINANCE_INVOICE_THRESHOLD",
        "ERP_COPILOT__RETRIEVAL__VECTOR_INDEX_PATH",
    ];

    fn set_minimal_env() {
        env::set_var("ERP_COPILOT__DATABASE__URL", "sqlite:erp.db");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "sqlite:erp.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_apply_to_missing_sections() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ai.model, "local-model");
        assert_eq!(config.retrieval.default_k, 3);
        assert_eq!(config.routing.default_domain().unwrap(), BusinessDomain::Sales);
        assert_eq!(config.approvals.finance_invoice_threshold, 1000.0);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ERP_COPILOT__SERVER__PORT", "3000");
        env::set_var("ERP_COPILOT__AI__MODEL", "gpt-4o-mini");
        env::set_var("ERP_COPILOT__ROUTING__DEFAULT_DOMAIN", "finance");
        env::set_var("ERP_COPILOT__APPROVALS__FINANCE_INVOICE_THRESHOLD", "10000");
        env::set_var("ERP_COPILOT__RETRIEVAL__VECTOR_INDEX_PATH", "/var/lib/erp/vectors.db");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.routing.default_domain().unwrap(), BusinessDomain::Finance);
        assert_eq!(config.approvals.finance_invoice_threshold, 10000.0);
        assert_eq!(
            config.retrieval.vector_index_path.as_deref(),
            Some(std::path::Path::new("/var/lib/erp/vectors.db"))
        );
    }

    #[test]
    fn test_missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
