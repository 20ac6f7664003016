//! The one-stop id facade.
//!
//! Wires every generator from [`AppConfig`] and routes calls to them.

use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, LongIdStrategy, UlidMode};
use crate::domain::{IdScope, ResourceType, Ulid128};
use crate::error::{Result, ValidationError};
use crate::service::clock::{Clock, SystemClock};
use crate::service::metrics::{MetricsSink, NoopMetrics, RecorderMetrics};
use crate::service::node::resolve_node_id;
use crate::service::public_id::{PublicIdCodec, PublicIdFactory};
use crate::service::segment::SegmentLongIdGenerator;
use crate::service::snowflake::SnowflakeIdGenerator;
use crate::service::striped::StripedUlidGenerator;
use crate::service::ulid::{MonotonicUlidGenerator, UlidGenerator};
use crate::storage::{IdSegmentRepository, create_repository};

/// Every id strategy behind one handle.
pub struct IdService {
    snowflake: SnowflakeIdGenerator,
    ulid: Arc<dyn UlidGenerator>,
    segment: SegmentLongIdGenerator,
    public_ids: PublicIdFactory,
    long_strategy: LongIdStrategy,
}

impl IdService {
    /// Build the service from configuration, connecting to the configured
    /// segment repository.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings and an
    /// infrastructure error when the repository is unreachable.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let repository = create_repository(&config.storage).await?;
        Self::with_repository(config, repository, Arc::new(SystemClock)).await
    }

    /// Build the service around an existing repository and clock.
    ///
    /// # Errors
    ///
    /// See [`IdService::from_config`].
    pub async fn with_repository(
        config: &AppConfig,
        repository: Arc<dyn IdSegmentRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let node_id = resolve_node_id(config.snowflake.node_id)?;
        let snowflake =
            SnowflakeIdGenerator::new(node_id, config.snowflake.epoch_ms, Arc::clone(&clock))?;

        let mode = config.ulid.mode;
        let metrics: Arc<dyn MetricsSink> = if config.ulid_metrics_enabled() {
            Arc::new(RecorderMetrics::new(mode.label()))
        } else {
            Arc::new(NoopMetrics)
        };
        let policy = config.ulid.rollback_policy();
        let ulid: Arc<dyn UlidGenerator> = match mode {
            UlidMode::Strict => Arc::new(MonotonicUlidGenerator::new(clock, policy, metrics)),
            UlidMode::Striped => Arc::new(StripedUlidGenerator::new(
                config.ulid.effective_stripes(),
                clock,
                policy,
                metrics,
            )?),
        };

        let segment = SegmentLongIdGenerator::new(repository, config.segment.step)?;
        if config.segment.init_scopes {
            for scope in IdScope::ALL {
                segment.init_scope(scope, 0).await?;
            }
        }

        let codec = if config.public_id.lower_case {
            PublicIdCodec::lower_case()
        } else {
            PublicIdCodec::new()
        };
        let public_ids = PublicIdFactory::new(Arc::clone(&ulid), codec);

        info!(
            node_id,
            ulid_mode = mode.label(),
            %policy,
            long_strategy = ?config.segment.long_strategy,
            backend = segment.repository().backend_name(),
            "Id service ready"
        );

        Ok(Self {
            snowflake,
            ulid,
            segment,
            public_ids,
            long_strategy: config.segment.long_strategy,
        })
    }

    /// Next long id for `scope`, from Snowflake or the segment allocator
    /// depending on `segment.long_strategy`.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub async fn next_long(&self, scope: IdScope) -> Result<i64> {
        match self.long_strategy {
            LongIdStrategy::Snowflake => self.snowflake.next_id(),
            LongIdStrategy::Segment => self.segment.next_id(scope).await,
        }
    }

    /// Next Snowflake id regardless of strategy.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_snowflake(&self) -> Result<i64> {
        self.snowflake.next_id()
    }

    /// Next segment id for `scope` regardless of strategy.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn next_segment(&self, scope: IdScope) -> Result<i64> {
        self.segment.next_id(scope).await
    }

    /// Next ULID.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_ulid(&self) -> Result<Ulid128> {
        self.ulid.next_ulid()
    }

    /// Next ULID as a 26-character string.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_ulid_string(&self) -> Result<String> {
        self.ulid.next_ulid_string()
    }

    /// Next ULID as 16 big-endian bytes.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_ulid_bytes(&self) -> Result<[u8; 16]> {
        self.ulid.next_ulid_bytes()
    }

    /// Next public id for `resource_type`.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn next_public_id(&self, resource_type: ResourceType) -> Result<String> {
        self.public_ids.next_public_id(resource_type)
    }

    /// Check a public id against `resource_type`.
    ///
    /// # Errors
    ///
    /// The first failing validation check.
    pub fn validate_public_id(
        &self,
        resource_type: ResourceType,
        candidate: &str,
    ) -> std::result::Result<(), ValidationError> {
        self.public_ids.validate_public_id(resource_type, candidate)
    }

    /// Decode a public id of `resource_type` back to its ULID.
    ///
    /// # Errors
    ///
    /// The first failing validation check.
    pub fn decode_public_id(
        &self,
        resource_type: ResourceType,
        candidate: &str,
    ) -> std::result::Result<Ulid128, ValidationError> {
        self.public_ids.codec().decode(resource_type, candidate)
    }

    /// Codec used for public ids.
    #[must_use]
    pub const fn public_id_codec(&self) -> &PublicIdCodec {
        self.public_ids.codec()
    }

    /// Node id stamped into Snowflake ids.
    #[must_use]
    pub const fn node_id(&self) -> i64 {
        self.snowflake.node_id()
    }
}
