//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid database URL format (expected sqlite:)")]
    InvalidDatabaseUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(&'static str),

    #[error("Temperature {0} is outside 0.0..=2.0")]
    InvalidTemperature(f32),

    #[error("max_tokens must be positive")]
    InvalidMaxTokens,

    #[error("retrieval.default_k must be positive")]
    InvalidRetrievalK,

    #[error("retrieval.excerpt_chars must be positive")]
    InvalidExcerptLength,

    #[error("Unknown business domain: {0}")]
    UnknownDomain(String),

    #[error("Invalid approval threshold: {0}")]
    InvalidThreshold(&'static str),

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
