//! Configuration management.

use serde::Deserialize;

/// Main store configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON logs instead of the pretty development format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_url() -> String {
    "postgres://localhost:5432/eventstore".to_string()
}
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }

impl StoreConfig {
    /// Load configuration from `STREAMBED__`-prefixed environment
    /// variables (e.g. `STREAMBED__DATABASE__URL`).
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("STREAMBED").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a file, with environment variables taking precedence.
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("STREAMBED").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
