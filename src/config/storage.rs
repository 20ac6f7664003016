//! Where segment counters live.

use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;

/// Segment repository selected by `storage.backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Counters in process memory; they restart from zero.
    Memory,
    /// One JSON file per scope under `storage.file.data_dir`.
    #[default]
    File,
    /// One integer key per scope on a single Redis node.
    Redis,
    /// `id_segment` table in `MySQL`.
    #[serde(rename = "mysql")]
    MySQL,
    /// `id_segment` table in `PostgreSQL`.
    #[serde(rename = "postgresql")]
    PostgreSQL,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redis => "redis",
            Self::MySQL => "mysql",
            Self::PostgreSQL => "postgresql",
        };
        f.write_str(name)
    }
}

/// `[storage]` section. Only the table of the selected backend is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub file: FileStorageConfig,

    #[serde(default)]
    pub redis: RedisStorageConfig,

    #[serde(default)]
    pub mysql: SqlStorageConfig,

    #[serde(default)]
    pub postgresql: SqlStorageConfig,
}

impl StorageConfig {
    /// Check the settings of the selected backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend has no usable URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StorageBackend::Memory | StorageBackend::File => Ok(()),
            StorageBackend::Redis => self.redis.validate(),
            StorageBackend::MySQL => self.mysql.validate("mysql"),
            StorageBackend::PostgreSQL => self.postgresql.validate("postgresql"),
        }
    }
}

/// `[storage.file]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
    /// Segment files are kept in `{data_dir}/segments`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `[storage.redis]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisStorageConfig {
    /// `redis://` or `rediss://` URL of one node.
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Keys are `{key_prefix}:{scope}`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisStorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Message(
                "storage.redis.url cannot be empty".to_string(),
            ));
        }
        let scheme_ok = self.url.starts_with("redis://") || self.url.starts_with("rediss://");
        if !scheme_ok || self.url.contains(',') {
            return Err(ConfigError::Message(format!(
                "storage.redis.url must be a single redis:// or rediss:// URL, got '{}'",
                self.url
            )));
        }
        Ok(())
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_connect_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "idbuilder:segment".to_string()
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connect_timeout: default_connect_timeout(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// `[storage.mysql]` and `[storage.postgresql]` sections.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlStorageConfig {
    /// Connection URL. Required when the backend is selected.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait when acquiring a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl SqlStorageConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Message(format!(
                "storage.{section}.url cannot be empty"
            )));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Message(format!(
                "storage.{section}.min_connections exceeds max_connections"
            )));
        }
        Ok(())
    }
}

/// Settings for [`crate::storage::MySqlSegmentRepository`].
pub type MySqlStorageConfig = SqlStorageConfig;

/// Settings for [`crate::storage::PostgresSegmentRepository`].
pub type PostgresStorageConfig = SqlStorageConfig;

const fn default_min_connections() -> u32 {
    5
}

const fn default_max_connections() -> u32 {
    20
}

impl Default for SqlStorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
        }
    }
}
