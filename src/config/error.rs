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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid answer service URL")]
    InvalidServiceUrl,

    #[error("Temperature must be between 0.0 and 2.0")]
    InvalidTemperature,

    #[error("Invalid stream settings: {0}")]
    InvalidStreamSettings(&'static str),

    #[error("Pending draft cap must be between 1 and 100")]
    InvalidDraftCap,

    #[error("Doctor tokens must be configured in production")]
    PermissiveTokensInProduction,

    #[error("JWT secret must be at least 32 bytes")]
    WeakJwtSecret,
}
