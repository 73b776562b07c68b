//! Application configuration module
//!
//! Configuration is read from environment variables with the `MEDQA` prefix,
//! nested values separated by double underscores. A `.env` file is loaded
//! first when present.
//!
//! # Example
//!
//! ```no_run
//! use medqa_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Relay listening on {:?}", config.server.socket_addr());
//! ```

mod ai;
mod auth;
mod consultation;
mod database;
mod error;
mod notifications;
mod redis;
mod server;

pub use ai::{AiConfig, DraftBackend};
pub use auth::{AuthConfig, TokenPolicy};
pub use consultation::ConsultationConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use notifications::{NotificationBackend, NotificationsConfig};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listener, environment and logging
    #[serde(default)]
    pub server: ServerConfig,

    /// Notification bus selection and stream tuning
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Redis connection, required by the redis notification backend
    pub redis: Option<RedisConfig>,

    /// Draft generator selection
    #[serde(default)]
    pub ai: AiConfig,

    /// Doctor token policy
    #[serde(default)]
    pub auth: AuthConfig,

    /// Draft buffering and default patient context
    #[serde(default)]
    pub consultation: ConsultationConfig,

    /// Consultation archive; archiving is off when unset
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `MEDQA__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `MEDQA__AI__REMOTE_URL=...` -> `ai.remote_url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEDQA")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values, including cross-section rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.notifications.validate()?;
        match (&self.redis, self.notifications.backend) {
            (Some(redis), _) => redis.validate()?,
            (None, NotificationBackend::Redis) => {
                return Err(ValidationError::MissingRequired("REDIS__URL"))
            }
            (None, NotificationBackend::InMemory) => {}
        }
        self.ai.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.consultation.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
