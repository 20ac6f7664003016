//! Configuration management module.
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `IDBUILDER__<SECTION>__<KEY>` pattern

mod generator;
mod storage;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

pub use generator::{
    LongIdStrategy, PublicIdConfig, RollbackConfig, RollbackPolicyKind, SegmentConfig,
    SnowflakeSettings, UlidConfig, UlidMode,
};
pub use storage::{
    FileStorageConfig, MySqlStorageConfig, PostgresStorageConfig, RedisStorageConfig,
    SqlStorageConfig, StorageBackend, StorageConfig,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Segment repository configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snowflake configuration.
    #[serde(default)]
    pub snowflake: SnowflakeSettings,

    /// ULID configuration.
    #[serde(default)]
    pub ulid: UlidConfig,

    /// Segment allocation configuration.
    #[serde(default)]
    pub segment: SegmentConfig,

    /// Public id configuration.
    #[serde(default)]
    pub public_id: PublicIdConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{IDBUILDER_PROFILE}.toml` (if `IDBUILDER_PROFILE` is set)
    /// 3. Environment variables with `IDBUILDER__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let profile =
            std::env::var("IDBUILDER_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{profile}")).required(false))
            // IDBUILDER__ULID__MODE=strict -> ulid.mode = "strict"
            .add_source(
                Environment::with_prefix("IDBUILDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Parse configuration from a TOML string, ignoring files and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the result is invalid.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let app_config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether ULID generators report metrics. `observability.metrics_enabled`
    /// implies it, since the installed recorder would otherwise stay empty.
    #[must_use]
    pub const fn ulid_metrics_enabled(&self) -> bool {
        self.ulid.metrics_enabled || self.observability.metrics_enabled
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        generator::validate(&self.snowflake, &self.ulid, &self.segment)?;
        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Install a Prometheus recorder for the `metrics` facade.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    false
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}
