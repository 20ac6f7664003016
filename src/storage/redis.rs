//! Redis segment repository.
//!
//! Each scope is a plain integer key. Allocation runs a Lua script that
//! refuses unseeded keys and otherwise `INCRBY`s the counter, so the check and
//! the increment are one atomic server-side step. `INCRBY` refuses to pass
//! `i64::MAX` and leaves the key untouched, which surfaces as
//! [`StorageError::Exhausted`].

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{RedisError, Script, cmd};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::{debug, info};

use crate::config::RedisStorageConfig;
use crate::domain::{IdScope, SegmentRange};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::IdSegmentRepository;

const NEXT_RANGE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
return redis.call('INCRBY', KEYS[1], ARGV[1])
";

/// Redis segment repository.
pub struct RedisSegmentRepository {
    pool: Pool,
    key_prefix: String,
    next_range_script: Script,
}

impl RedisSegmentRepository {
    /// Build a pool for the configured node.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built.
    pub fn connect(config: &RedisStorageConfig) -> StorageResult<Self> {
        let url = config.url.as_str();
        let mut pool_config = Config::from_url(url);
        let mut pool = PoolConfig::new(config.pool_size as usize);
        let timeout = Some(Duration::from_secs(config.connect_timeout));
        pool.timeouts.wait = timeout;
        pool.timeouts.create = timeout;
        pool_config.pool = Some(pool);
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(url = %url, pool_size = config.pool_size, "Redis segment store configured");
        Ok(Self::from_pool(pool, config.key_prefix.clone()))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool, key_prefix: String) -> Self {
        Self {
            pool,
            key_prefix,
            next_range_script: Script::new(NEXT_RANGE_SCRIPT),
        }
    }

    fn key(&self, scope: IdScope) -> String {
        format!("{}:{}", self.key_prefix, scope.scope_name())
    }
}

#[async_trait]
impl IdSegmentRepository for RedisSegmentRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        let mut conn = self.pool.get().await?;
        let new_max: Option<i64> = self
            .next_range_script
            .key(self.key(scope))
            .arg(step)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| script_error(scope, e))?;

        let new_max = new_max.ok_or_else(|| StorageError::NotFound(scope.to_string()))?;
        let range = SegmentRange::ending_at(new_max, step).ok_or_else(|| {
            StorageError::InvalidRange(format!("no range of step {step} ends at {new_max}"))
        })?;
        debug!(%scope, min = range.min_id, max = range.max_id, "Allocated segment");
        Ok(range)
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        let mut conn = self.pool.get().await?;
        let created: Option<String> = cmd("SET")
            .arg(self.key(scope))
            .arg(initial_max_id)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        if created.is_some() {
            info!(%scope, initial_max_id, default_step, "Segment scope initialized");
        }
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.pool.get().await?;
        let _: String = cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn script_error(scope: IdScope, err: RedisError) -> StorageError {
    if is_overflow(&err.to_string()) {
        StorageError::Exhausted(scope.to_string())
    } else {
        err.into()
    }
}

// "ERR increment or decrement would overflow"
fn is_overflow(message: &str) -> bool {
    message.contains("would overflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_overflow() {
        assert!(is_overflow(
            "An error was signalled by the server - ResponseError: increment or decrement would overflow"
        ));
        assert!(!is_overflow("WRONGTYPE Operation against a key holding the wrong kind of value"));
    }

    #[test]
    fn test_range_at_counter_limit() {
        assert_eq!(
            SegmentRange::ending_at(i64::MAX, 10),
            Some(SegmentRange::new(i64::MAX - 9, i64::MAX))
        );
    }
}
