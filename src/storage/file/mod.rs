//! File-based segment repository.
//!
//! Stores one JSON counter per scope with OS file locking around every
//! read-modify-write. Suitable for development and single-host deployments,
//! including several processes sharing one data directory.
//!
//! Directory structure:
//! ```text
//! data/
//! └── segments/
//!     └── {scope}.json
//! ```

mod segment;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::FileStorageConfig;
use crate::domain::{IdScope, SegmentRange, SegmentState};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::IdSegmentRepository;

pub use segment::FileSegmentStore;

/// File-based segment repository.
pub struct FileSegmentRepository {
    /// Base data directory.
    base_dir: PathBuf,
    /// Per-scope counter files.
    store: FileSegmentStore,
}

impl FileSegmentRepository {
    /// Create a new file repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();
        Self::ensure_directories(&base_dir)?;

        Ok(Self {
            store: FileSegmentStore::new(base_dir.join("segments")),
            base_dir,
        })
    }

    fn ensure_directories(base_dir: &Path) -> StorageResult<()> {
        for dir in [base_dir.to_path_buf(), base_dir.join("segments")] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Persisted state for `scope`, if seeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter file cannot be read.
    pub async fn state(&self, scope: IdScope) -> StorageResult<Option<SegmentState>> {
        self.store.state(scope.scope_name()).await
    }
}

#[async_trait]
impl IdSegmentRepository for FileSegmentRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        self.store.advance(scope.scope_name(), step).await
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        self.store
            .init_if_absent(scope.scope_name(), initial_max_id, default_step)
            .await
            .map(|_| ())
    }

    async fn health_check(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repository() -> (FileSegmentRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let repository = FileSegmentRepository::new(&config).unwrap();
        (repository, temp_dir)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (repository, _temp) = create_test_repository();
        assert!(repository.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_segment_operations() {
        let (repository, _temp) = create_test_repository();

        let err = repository.next_range(IdScope::Order, 100).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        repository
            .init_scope_if_absent(IdScope::Order, 0, 100)
            .await
            .unwrap();
        let range = repository.next_range(IdScope::Order, 100).await.unwrap();
        assert_eq!(range, SegmentRange::new(1, 100));

        let state = repository.state(IdScope::Order).await.unwrap().unwrap();
        assert_eq!(state.scope, "order");
        assert_eq!(state.max_id, 100);
        assert_eq!(state.step, 100);
    }

    #[tokio::test]
    async fn test_counter_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };

        {
            let repository = FileSegmentRepository::new(&config).unwrap();
            repository
                .init_scope_if_absent(IdScope::Member, 0, 50)
                .await
                .unwrap();
            repository.next_range(IdScope::Member, 50).await.unwrap();
        }

        let repository = FileSegmentRepository::new(&config).unwrap();
        repository
            .init_scope_if_absent(IdScope::Member, 0, 50)
            .await
            .unwrap();
        let range = repository.next_range(IdScope::Member, 50).await.unwrap();
        assert_eq!(range, SegmentRange::new(51, 100));
    }
}
