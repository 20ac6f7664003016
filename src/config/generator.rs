//! Generator configuration sections.

use config::ConfigError;
use serde::Deserialize;

use crate::domain::ClockRollbackPolicy;
use crate::service::snowflake::{DEFAULT_EPOCH_MS, MAX_NODE_ID};
use crate::service::striped::MAX_STRIPES;

/// Snowflake configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Explicit node id. Resolved from the environment when absent.
    #[serde(default)]
    pub node_id: Option<i64>,

    /// Custom epoch in milliseconds since the Unix epoch.
    #[serde(default = "default_epoch_ms")]
    pub epoch_ms: i64,
}

const fn default_epoch_ms() -> i64 {
    DEFAULT_EPOCH_MS
}

impl Default for SnowflakeSettings {
    fn default() -> Self {
        Self {
            node_id: None,
            epoch_ms: DEFAULT_EPOCH_MS,
        }
    }
}

/// ULID generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UlidMode {
    /// One monotonic generator behind one lock. Global order per process.
    Strict,
    /// Independent stripes. Order within a stripe only.
    #[default]
    Striped,
}

impl UlidMode {
    /// Metric label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Striped => "striped",
        }
    }
}

/// Rollback policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicyKind {
    /// Keep using the last timestamp.
    #[default]
    UseLast,
    /// Fail past a threshold.
    FailFast,
}

/// Clock rollback configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackConfig {
    /// Policy kind.
    #[serde(default)]
    pub policy: RollbackPolicyKind,

    /// Largest tolerated rollback under `fail_fast`, in milliseconds.
    #[serde(default = "default_fail_fast_threshold_ms")]
    pub fail_fast_threshold_ms: i64,
}

const fn default_fail_fast_threshold_ms() -> i64 {
    5000
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            policy: RollbackPolicyKind::UseLast,
            fail_fast_threshold_ms: default_fail_fast_threshold_ms(),
        }
    }
}

impl From<&RollbackConfig> for ClockRollbackPolicy {
    fn from(config: &RollbackConfig) -> Self {
        match config.policy {
            RollbackPolicyKind::UseLast => Self::UseLast,
            RollbackPolicyKind::FailFast => Self::FailFast {
                threshold_ms: config.fail_fast_threshold_ms,
            },
        }
    }
}

/// ULID configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UlidConfig {
    /// Generation mode.
    #[serde(default)]
    pub mode: UlidMode,

    /// Stripe count for striped mode. Defaults to `min(32, cpus)`.
    #[serde(default)]
    pub stripes: Option<usize>,

    /// Clock rollback handling.
    #[serde(default)]
    pub rollback: RollbackConfig,

    /// Report generator metrics through the `metrics` facade without
    /// installing the Prometheus recorder. See
    /// [`AppConfig::ulid_metrics_enabled`](super::AppConfig::ulid_metrics_enabled).
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl UlidConfig {
    /// Stripe count after defaults and clamping.
    #[must_use]
    pub fn effective_stripes(&self) -> usize {
        self.stripes
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map_or(1, std::num::NonZeroUsize::get)
                    .min(32)
            })
            .clamp(1, MAX_STRIPES)
    }

    /// Rollback policy as a domain value.
    #[must_use]
    pub fn rollback_policy(&self) -> ClockRollbackPolicy {
        ClockRollbackPolicy::from(&self.rollback)
    }
}

/// How `next_long` produces ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongIdStrategy {
    /// Snowflake ids; no storage round trips.
    #[default]
    Snowflake,
    /// Durable per-scope segments.
    Segment,
}

/// Segment allocation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    /// Ids reserved per repository round trip.
    #[serde(default = "default_step")]
    pub step: u32,

    /// Strategy behind `next_long`.
    #[serde(default)]
    pub long_strategy: LongIdStrategy,

    /// Seed every scope at startup.
    #[serde(default = "default_init_scopes")]
    pub init_scopes: bool,
}

const fn default_step() -> u32 {
    1000
}

const fn default_init_scopes() -> bool {
    true
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            long_strategy: LongIdStrategy::Snowflake,
            init_scopes: true,
        }
    }
}

/// Public id configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicIdConfig {
    /// Render the ULID segment in lower case.
    #[serde(default)]
    pub lower_case: bool,
}

pub(super) fn validate(
    snowflake: &SnowflakeSettings,
    ulid: &UlidConfig,
    segment: &SegmentConfig,
) -> Result<(), ConfigError> {
    if let Some(node_id) = snowflake.node_id
        && !(0..=MAX_NODE_ID).contains(&node_id)
    {
        return Err(ConfigError::Message(format!(
            "snowflake.node_id must be in [0, {MAX_NODE_ID}], got {node_id}"
        )));
    }
    if snowflake.epoch_ms < 0 {
        return Err(ConfigError::Message(
            "snowflake.epoch_ms cannot be negative".to_string(),
        ));
    }
    if ulid.stripes == Some(0) {
        return Err(ConfigError::Message(
            "ulid.stripes cannot be 0".to_string(),
        ));
    }
    if ulid.rollback.fail_fast_threshold_ms < 0 {
        return Err(ConfigError::Message(
            "ulid.rollback.fail_fast_threshold_ms cannot be negative".to_string(),
        ));
    }
    if segment.step == 0 {
        return Err(ConfigError::Message(
            "segment.step cannot be 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_policy_conversion() {
        let mut config = UlidConfig::default();
        assert_eq!(config.rollback_policy(), ClockRollbackPolicy::UseLast);

        config.rollback.policy = RollbackPolicyKind::FailFast;
        config.rollback.fail_fast_threshold_ms = 250;
        assert_eq!(
            config.rollback_policy(),
            ClockRollbackPolicy::FailFast { threshold_ms: 250 }
        );
    }

    #[test]
    fn test_effective_stripes() {
        let mut config = UlidConfig::default();
        let stripes = config.effective_stripes();
        assert!((1..=32).contains(&stripes));

        config.stripes = Some(4096);
        assert_eq!(config.effective_stripes(), MAX_STRIPES);
    }

    #[test]
    fn test_validate() {
        let snowflake = SnowflakeSettings::default();
        let ulid = UlidConfig::default();
        let segment = SegmentConfig::default();
        assert!(validate(&snowflake, &ulid, &segment).is_ok());

        let bad_node = SnowflakeSettings {
            node_id: Some(1024),
            ..SnowflakeSettings::default()
        };
        assert!(validate(&bad_node, &ulid, &segment).is_err());

        let bad_step = SegmentConfig {
            step: 0,
            ..SegmentConfig::default()
        };
        assert!(validate(&snowflake, &ulid, &bad_step).is_err());
    }
}
