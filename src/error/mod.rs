//! Error handling module.
//!
//! Every generator reports failures through [`IdError`]. Storage backends use the
//! narrower [`StorageError`], which surfaces to callers as
//! [`IdError::Infrastructure`]. Public-ID decoding failures are described by
//! [`ValidationError`] and never touch generator state.

pub mod codes;

pub use codes::{ErrorCategory, ErrorCode};

/// Crate-level error type.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid construction parameter (node id, stripe count, step, ...).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The clock moved backwards further than the fail-fast threshold allows.
    #[error("Clock moved backwards by {rollback_ms}ms (threshold {threshold_ms}ms)")]
    ClockRollback {
        /// Observed rollback magnitude in milliseconds.
        rollback_ms: i64,
        /// Configured threshold in milliseconds.
        threshold_ms: i64,
    },

    /// A timestamp field or segment counter can no longer advance.
    #[error("ID space exhausted: {0}")]
    IdSpaceExhausted(String),

    /// The segment repository failed.
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] StorageError),

    /// A public identifier failed validation.
    #[error("Invalid public id: {0}")]
    Validation(#[from] ValidationError),
}

impl IdError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::INVALID_CONFIG,
            Self::ClockRollback { .. } => ErrorCode::CLOCK_ROLLBACK,
            Self::IdSpaceExhausted(_) => ErrorCode::ID_SPACE_EXHAUSTED,
            Self::Infrastructure(_) => ErrorCode::STORAGE_ERROR,
            Self::Validation(err) => err.error_code(),
        }
    }

    /// Whether the caller may retry the operation (with backoff).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_) | Self::ClockRollback { .. })
    }
}

/// Storage-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection error.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIO(String),

    /// Scope has not been seeded.
    #[error("Segment scope not found: {0}")]
    NotFound(String),

    /// The scope counter cannot advance without passing `i64::MAX`.
    #[error("Segment space exhausted for scope {0}")]
    Exhausted(String),

    /// The backend returned a range that cannot be dispensed.
    #[error("Invalid segment range: {0}")]
    InvalidRange(String),

    /// Backend not available.
    #[error("Storage backend unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIO(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<deadpool_redis::PoolError> for StorageError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for StorageError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        Self::Query(err.to_string())
    }
}

/// Public-ID validation failure. Checks run in a fixed order and the first
/// failing one is reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No `_` separator, or more than one.
    #[error("missing separator in '{candidate}'")]
    MissingSeparator {
        /// The rejected input.
        candidate: String,
    },

    /// The prefix segment belongs to a different resource type.
    #[error("type mismatch: expected prefix '{expected}', found '{actual}'")]
    TypeMismatch {
        /// Prefix of the expected resource type.
        expected: &'static str,
        /// Prefix found in the candidate.
        actual: String,
    },

    /// The prefix segment names no known resource type.
    #[error("unknown prefix '{prefix}'")]
    UnknownPrefix {
        /// Prefix found in the candidate.
        prefix: String,
    },

    /// The ULID segment is malformed.
    #[error("invalid ulid: {0}")]
    InvalidUlid(#[from] UlidDecodeError),
}

impl ValidationError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingSeparator { .. } => ErrorCode::MISSING_SEPARATOR,
            Self::TypeMismatch { .. } | Self::UnknownPrefix { .. } => ErrorCode::TYPE_MISMATCH,
            Self::InvalidUlid(_) => ErrorCode::INVALID_ULID,
        }
    }
}

/// Reasons a 26-character Crockford string does not decode to a ULID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UlidDecodeError {
    /// Wrong number of characters.
    #[error("invalid length {len}, expected 26")]
    InvalidLength {
        /// Actual length in bytes.
        len: usize,
    },

    /// A character outside the Crockford alphabet.
    #[error("invalid character {byte:#04x} at index {index}")]
    InvalidCharacter {
        /// Offending byte.
        byte: u8,
        /// Position in the input.
        index: usize,
    },

    /// The value does not fit in 128 bits.
    #[error("value exceeds 128 bits")]
    Overflow,
}

/// Result type alias using `IdError`.
pub type Result<T> = std::result::Result<T, IdError>;

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
