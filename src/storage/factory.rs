//! Storage backend factory.
//!
//! Creates the segment repository selected by configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageResult;
use crate::storage::file::FileSegmentRepository;
use crate::storage::memory::InMemorySegmentRepository;
use crate::storage::redis::RedisSegmentRepository;
use crate::storage::sql::{MySqlSegmentRepository, PostgresSegmentRepository};
use crate::storage::traits::IdSegmentRepository;

/// Create a segment repository based on configuration.
///
/// SQL backends get their `id_segment` table created when missing. Every
/// backend must pass a health check before it is returned.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialized or is unreachable.
pub async fn create_repository(
    config: &StorageConfig,
) -> StorageResult<Arc<dyn IdSegmentRepository>> {
    let repository: Arc<dyn IdSegmentRepository> = match config.backend {
        StorageBackend::Memory => Arc::new(InMemorySegmentRepository::new()),
        StorageBackend::File => Arc::new(FileSegmentRepository::new(&config.file)?),
        StorageBackend::Redis => Arc::new(RedisSegmentRepository::connect(&config.redis)?),
        StorageBackend::MySQL => {
            let repository = MySqlSegmentRepository::connect(&config.mysql).await?;
            repository.ensure_schema().await?;
            Arc::new(repository)
        }
        StorageBackend::PostgreSQL => {
            let repository = PostgresSegmentRepository::connect(&config.postgresql).await?;
            repository.ensure_schema().await?;
            Arc::new(repository)
        }
    };

    repository.health_check().await?;
    info!(backend = repository.backend_name(), "Segment repository ready");

    Ok(repository)
}
