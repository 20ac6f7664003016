//! Clock rollback policy.

use serde::{Deserialize, Serialize};

/// What a ULID generator does when the clock reports an earlier time than it
/// has already used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClockRollbackPolicy {
    /// Keep emitting on the last timestamp, whatever the rollback magnitude.
    #[default]
    UseLast,
    /// Fail when the rollback exceeds `threshold_ms`, otherwise behave like
    /// [`ClockRollbackPolicy::UseLast`].
    FailFast {
        /// Largest tolerated rollback in milliseconds.
        threshold_ms: i64,
    },
}

impl ClockRollbackPolicy {
    /// Metric/log label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UseLast => "use_last",
            Self::FailFast { .. } => "fail_fast",
        }
    }
}

impl std::fmt::Display for ClockRollbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UseLast => write!(f, "USE_LAST"),
            Self::FailFast { threshold_ms } => write!(f, "FAIL_FAST({threshold_ms}ms)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ClockRollbackPolicy::UseLast.to_string(), "USE_LAST");
        assert_eq!(
            ClockRollbackPolicy::FailFast { threshold_ms: 10 }.to_string(),
            "FAIL_FAST(10ms)"
        );
    }

    #[test]
    fn test_default_is_use_last() {
        assert_eq!(ClockRollbackPolicy::default(), ClockRollbackPolicy::UseLast);
    }
}
