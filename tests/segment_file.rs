//! Integration tests for segment allocation on the file repository.
//!
//! These exercise several generators and service restarts over one shared
//! data directory.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use idbuilder_core::config::{AppConfig, FileStorageConfig, LongIdStrategy, StorageBackend};
use idbuilder_core::domain::{IdScope, SegmentRange};
use idbuilder_core::error::{IdError, StorageResult};
use idbuilder_core::service::{IdService, SegmentLongIdGenerator};
use idbuilder_core::storage::{FileSegmentRepository, IdSegmentRepository};

// ============================================================================
// Test Harness
// ============================================================================

/// Counts `next_range` calls on the wrapped repository.
struct CountingRepository {
    inner: FileSegmentRepository,
    fetches: AtomicUsize,
}

impl CountingRepository {
    fn new(inner: FileSegmentRepository) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdSegmentRepository for CountingRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.next_range(scope, step).await
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        self.inner
            .init_scope_if_absent(scope, initial_max_id, default_step)
            .await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

fn file_repository(dir: &TempDir) -> FileSegmentRepository {
    FileSegmentRepository::new(&FileStorageConfig {
        data_dir: dir.path().to_path_buf(),
    })
    .expect("Failed to open file repository")
}

fn file_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.file.data_dir = dir.path().to_path_buf();
    config.snowflake.node_id = Some(3);
    config.segment.long_strategy = LongIdStrategy::Segment;
    config.segment.step = 50;
    config
}

// ============================================================================
// Segment Tests
// ============================================================================

#[tokio::test]
async fn test_refill_happens_once_per_step() {
    let dir = TempDir::new().unwrap();
    let repository = Arc::new(CountingRepository::new(file_repository(&dir)));
    let generator = SegmentLongIdGenerator::new(repository.clone(), 1000).unwrap();
    generator.init_scope(IdScope::Order, 0).await.unwrap();

    for expected in 1..=1000 {
        assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), expected);
    }
    assert_eq!(repository.fetches(), 1);

    assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), 1001);
    assert_eq!(repository.fetches(), 2);
}

#[tokio::test]
async fn test_generators_sharing_directory_never_overlap() {
    let dir = TempDir::new().unwrap();
    let a = SegmentLongIdGenerator::new(Arc::new(file_repository(&dir)), 100).unwrap();
    let b = SegmentLongIdGenerator::new(Arc::new(file_repository(&dir)), 100).unwrap();
    a.init_scope(IdScope::Coupon, 0).await.unwrap();
    b.init_scope(IdScope::Coupon, 0).await.unwrap();

    let mut seen = HashSet::new();
    for _ in 0..250 {
        assert!(seen.insert(a.next_id(IdScope::Coupon).await.unwrap()));
        assert!(seen.insert(b.next_id(IdScope::Coupon).await.unwrap()));
    }
    assert_eq!(seen.len(), 500);

    let state = file_repository(&dir)
        .state(IdScope::Coupon)
        .await
        .unwrap()
        .expect("scope should be seeded");
    assert_eq!(state.max_id, 600);
}

#[tokio::test]
async fn test_restart_skips_unused_ids() {
    let dir = TempDir::new().unwrap();

    let first = {
        let service = IdService::from_config(&file_config(&dir)).await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(service.next_long(IdScope::Sku).await.unwrap());
        }
        ids
    };
    assert_eq!(first, (1..=10).collect::<Vec<_>>());

    let service = IdService::from_config(&file_config(&dir)).await.unwrap();
    // The unused tail of the first segment is abandoned.
    assert_eq!(service.next_long(IdScope::Sku).await.unwrap(), 51);
    assert_eq!(service.next_segment(IdScope::Tenant).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generators_on_one_directory() {
    let dir = TempDir::new().unwrap();
    let generators: Vec<_> = (0..4)
        .map(|_| Arc::new(SegmentLongIdGenerator::new(Arc::new(file_repository(&dir)), 25).unwrap()))
        .collect();
    generators[0].init_scope(IdScope::Member, 0).await.unwrap();

    let handles: Vec<_> = generators
        .iter()
        .map(|generator| {
            let generator = Arc::clone(generator);
            tokio::spawn(async move {
                let mut ids = Vec::with_capacity(200);
                for _ in 0..200 {
                    ids.push(generator.next_id(IdScope::Member).await.unwrap());
                }
                ids
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(all.insert(id));
        }
    }
    assert_eq!(all.len(), 800);
}

#[tokio::test]
async fn test_empty_segment_file_is_seeded() {
    let dir = TempDir::new().unwrap();
    let repository = file_repository(&dir);
    std::fs::write(dir.path().join("segments").join("order.json"), b"").unwrap();

    repository
        .init_scope_if_absent(IdScope::Order, 0, 10)
        .await
        .unwrap();
    assert_eq!(
        repository.next_range(IdScope::Order, 10).await.unwrap(),
        SegmentRange::new(1, 10)
    );
}

#[tokio::test]
async fn test_exhausted_scope_keeps_file_counter() {
    let dir = TempDir::new().unwrap();
    let generator = SegmentLongIdGenerator::new(Arc::new(file_repository(&dir)), 10).unwrap();
    generator
        .init_scope(IdScope::Order, i64::MAX - 5)
        .await
        .unwrap();

    let err = generator.next_id(IdScope::Order).await.unwrap_err();
    assert!(matches!(err, IdError::IdSpaceExhausted(_)));

    let state = file_repository(&dir)
        .state(IdScope::Order)
        .await
        .unwrap()
        .expect("scope should be seeded");
    assert_eq!(state.max_id, i64::MAX - 5);
}
