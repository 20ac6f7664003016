//! Error code constants.
//!
//! Error codes are organized by category:
//! - 1xxx: Configuration errors
//! - 2xxx: Clock errors
//! - 3xxx: Validation errors
//! - 4xxx: Capacity errors
//! - 5xxx: Infrastructure errors

/// Error code type with semantic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    // ===== Configuration Errors (1xxx) =====

    /// Invalid configuration parameters.
    pub const INVALID_CONFIG: Self = Self(1003);

    // ===== Clock Errors (2xxx) =====

    /// Clock rollback beyond the fail-fast threshold.
    pub const CLOCK_ROLLBACK: Self = Self(2001);

    // ===== Validation Errors (3xxx) =====

    /// Public id has no (or more than one) separator.
    pub const MISSING_SEPARATOR: Self = Self(3001);

    /// Public id prefix belongs to another resource type.
    pub const TYPE_MISMATCH: Self = Self(3002);

    /// Public id ULID segment is malformed.
    pub const INVALID_ULID: Self = Self(3003);

    // ===== Capacity Errors (4xxx) =====

    /// Timestamp bits exhausted.
    pub const ID_SPACE_EXHAUSTED: Self = Self(4001);

    // ===== Infrastructure Errors (5xxx) =====

    /// Storage backend error.
    pub const STORAGE_ERROR: Self = Self(5001);

    /// Get the error code as an i32.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Get the category of this error code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.0 {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Clock,
            3000..=3999 => ErrorCategory::Validation,
            4000..=4999 => ErrorCategory::Capacity,
            5000..=5999 => ErrorCategory::Infrastructure,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

/// Error category based on error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Construction-time configuration errors (1xxx).
    Configuration,
    /// Clock errors (2xxx).
    Clock,
    /// Validation errors (3xxx).
    Validation,
    /// Capacity errors (4xxx).
    Capacity,
    /// Infrastructure errors (5xxx).
    Infrastructure,
    /// Unknown category.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Clock => write!(f, "clock"),
            Self::Validation => write!(f, "validation"),
            Self::Capacity => write!(f, "capacity"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::INVALID_CONFIG.as_i32(), 1003);
        assert_eq!(ErrorCode::CLOCK_ROLLBACK.as_i32(), 2001);
        assert_eq!(ErrorCode::MISSING_SEPARATOR.as_i32(), 3001);
        assert_eq!(ErrorCode::ID_SPACE_EXHAUSTED.as_i32(), 4001);
        assert_eq!(ErrorCode::STORAGE_ERROR.as_i32(), 5001);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::INVALID_CONFIG.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCode::CLOCK_ROLLBACK.category(), ErrorCategory::Clock);
        assert_eq!(
            ErrorCode::INVALID_ULID.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCode::ID_SPACE_EXHAUSTED.category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            ErrorCode::STORAGE_ERROR.category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
