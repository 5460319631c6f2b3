use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ALLOCATION_RETRIES: u32 = 3;

/// Application configuration with validation.
///
/// Values are layered: `config/default.toml`, then
/// `config/{environment}.toml`, then `FULFILLMENT_*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (postgres:// or sqlite://)
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Bounded number of internal retries when an allocation or sealing
    /// transaction loses a race before surfacing `ConcurrencyConflict`
    #[serde(default = "default_allocation_retries")]
    #[validate(range(min = 1, max = 10))]
    pub allocation_retries: u32,

    /// Deployment environment name
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_allocation_retries() -> u32 {
    DEFAULT_ALLOCATION_RETRIES
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            allocation_retries: DEFAULT_ALLOCATION_RETRIES,
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] ConfigError),
    #[error("configuration failed validation: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl AppConfig {
    /// Builds configuration from layered files and environment variables.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let environment = env::var("FULFILLMENT_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let builder = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(Environment::with_prefix("FULFILLMENT").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %config.environment,
            max_connections = config.max_connections,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Convenience constructor used by tests and embedders that already know
    /// their database URL.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
