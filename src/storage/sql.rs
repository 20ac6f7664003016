//! SQL segment repositories (`PostgreSQL` and `MySQL`).
//!
//! Both keep one row per scope in `id_segment`:
//!
//! ```sql
//! scope       VARCHAR(64) PRIMARY KEY
//! max_id      BIGINT      NOT NULL
//! step        INT         NOT NULL
//! updated_at  TIMESTAMP   NOT NULL
//! ```
//!
//! `PostgreSQL` advances the counter with a single `UPDATE ... RETURNING`.
//! `MySQL` has no `RETURNING`, so it locks the row with `SELECT ... FOR UPDATE`
//! inside a transaction.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::config::{MySqlStorageConfig, PostgresStorageConfig};
use crate::domain::{IdScope, SegmentRange};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::IdSegmentRepository;

const POSTGRES_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS id_segment (
    scope       VARCHAR(64) PRIMARY KEY,
    max_id      BIGINT      NOT NULL,
    step        INTEGER     NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const MYSQL_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS id_segment (
    scope       VARCHAR(64) NOT NULL PRIMARY KEY,
    max_id      BIGINT      NOT NULL,
    step        INT         NOT NULL,
    updated_at  DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3)
) ENGINE = InnoDB";

fn range_ending_at(new_max: i64, step: u32) -> StorageResult<SegmentRange> {
    let range = SegmentRange::ending_at(new_max, step).ok_or_else(|| {
        StorageError::InvalidRange(format!("no range of step {step} ends at {new_max}"))
    })?;
    if range.is_empty() {
        return Err(StorageError::InvalidRange(format!(
            "step {step} yields an empty range ending at {new_max}"
        )));
    }
    Ok(range)
}

/// Largest counter that can still advance by `step`.
const fn advance_ceiling(step: u32) -> i64 {
    i64::MAX - step as i64
}

/// `PostgreSQL` segment repository.
pub struct PostgresSegmentRepository {
    pool: PgPool,
}

impl PostgresSegmentRepository {
    /// Connect using `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect.
    pub async fn connect(config: &PostgresStorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL segment store"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `id_segment` table if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(POSTGRES_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IdSegmentRepository for PostgresSegmentRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        let new_max: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE id_segment
               SET max_id = max_id + $1, updated_at = NOW()
             WHERE scope = $2 AND max_id <= $3
            RETURNING max_id
            ",
        )
        .bind(i64::from(step))
        .bind(scope.scope_name())
        .bind(advance_ceiling(step))
        .fetch_optional(&self.pool)
        .await?;

        let Some(new_max) = new_max else {
            // Either the row is missing or it sits too close to i64::MAX.
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT max_id FROM id_segment WHERE scope = $1")
                    .bind(scope.scope_name())
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match exists {
                Some(_) => StorageError::Exhausted(scope.to_string()),
                None => StorageError::NotFound(scope.to_string()),
            });
        };
        let range = range_ending_at(new_max, step)?;
        debug!(%scope, min = range.min_id, max = range.max_id, "Allocated segment");
        Ok(range)
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r"
            INSERT INTO id_segment (scope, max_id, step, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (scope) DO NOTHING
            ",
        )
        .bind(scope.scope_name())
        .bind(initial_max_id)
        .bind(i64::from(default_step))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(%scope, initial_max_id, default_step, "Segment scope initialized");
        }
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}

/// `MySQL` segment repository.
pub struct MySqlSegmentRepository {
    pool: MySqlPool,
}

impl MySqlSegmentRepository {
    /// Connect using `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect.
    pub async fn connect(config: &MySqlStorageConfig) -> StorageResult<Self> {
        let pool = MySqlPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        info!(
            max_connections = config.max_connections,
            "Connected to MySQL segment store"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the `id_segment` table if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(MYSQL_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IdSegmentRepository for MySqlSegmentRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT max_id FROM id_segment WHERE scope = ? FOR UPDATE")
                .bind(scope.scope_name())
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or_else(|| StorageError::NotFound(scope.to_string()))?;

        // Dropping `tx` rolls back and releases the row lock.
        let range = SegmentRange::after(current, step)
            .ok_or_else(|| StorageError::Exhausted(scope.to_string()))?;
        sqlx::query("UPDATE id_segment SET max_id = ?, updated_at = NOW(3) WHERE scope = ?")
            .bind(range.max_id)
            .bind(scope.scope_name())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(%scope, min = range.min_id, max = range.max_id, "Allocated segment");
        Ok(range)
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT IGNORE INTO id_segment (scope, max_id, step, updated_at) VALUES (?, ?, ?, NOW(3))",
        )
        .bind(scope.scope_name())
        .bind(initial_max_id)
        .bind(default_step)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(%scope, initial_max_id, default_step, "Segment scope initialized");
        }
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mysql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_ending_at() {
        assert_eq!(
            range_ending_at(1000, 1000).unwrap(),
            SegmentRange::new(1, 1000)
        );
        assert_eq!(
            range_ending_at(2500, 500).unwrap(),
            SegmentRange::new(2001, 2500)
        );
        assert!(matches!(
            range_ending_at(10, 0),
            Err(StorageError::InvalidRange(_))
        ));
        assert!(matches!(
            range_ending_at(i64::MIN + 5, 10),
            Err(StorageError::InvalidRange(_))
        ));
        assert_eq!(
            range_ending_at(i64::MAX, 5).unwrap(),
            SegmentRange::new(i64::MAX - 4, i64::MAX)
        );
    }

    #[test]
    fn test_advance_ceiling() {
        assert_eq!(advance_ceiling(0), i64::MAX);
        assert_eq!(advance_ceiling(10), i64::MAX - 10);
        assert!(SegmentRange::after(advance_ceiling(10), 10).is_some());
        assert!(SegmentRange::after(advance_ceiling(10) + 1, 10).is_none());
    }
}
