//! Segment-based long id generator.
//!
//! Reserves blocks of `step` ids per scope from a durable repository and hands
//! them out from memory. Each scope has its own async lock, so a refill for one
//! scope never blocks another. Ids are unique per scope across restarts as
//! long as the repository is durable; they are not ordered across processes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{IdScope, SegmentRange};
use crate::error::{IdError, Result, StorageError};
use crate::storage::IdSegmentRepository;

/// Ids still available in the current segment of one scope.
#[derive(Debug, Default)]
struct SegmentBuffer {
    next: i64,
    remaining: u64,
}

impl SegmentBuffer {
    const fn load(&mut self, range: SegmentRange) {
        self.next = range.min_id;
        self.remaining = range.size();
    }

    /// Hand out the next id. `next` never moves past the range end, so a
    /// segment ending at `i64::MAX` drains without overflow.
    const fn take(&mut self) -> Option<i64> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.next += 1;
        }
        Some(id)
    }

    const fn remaining(&self) -> u64 {
        self.remaining
    }
}

/// Durable per-scope long id generator.
pub struct SegmentLongIdGenerator {
    repository: Arc<dyn IdSegmentRepository>,
    step: u32,
    buffers: DashMap<IdScope, Arc<Mutex<SegmentBuffer>>>,
}

impl SegmentLongIdGenerator {
    /// Create a generator reserving `step` ids per round trip.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] when `step` is zero.
    pub fn new(repository: Arc<dyn IdSegmentRepository>, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(IdError::Configuration(
                "segment step must be positive".to_string(),
            ));
        }
        Ok(Self {
            repository,
            step,
            buffers: DashMap::new(),
        })
    }

    /// Ids reserved per repository round trip.
    #[must_use]
    pub const fn step(&self) -> u32 {
        self.step
    }

    /// Backend behind this generator.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn IdSegmentRepository> {
        &self.repository
    }

    fn buffer(&self, scope: IdScope) -> Arc<Mutex<SegmentBuffer>> {
        Arc::clone(
            self.buffers
                .entry(scope)
                .or_insert_with(|| Arc::new(Mutex::new(SegmentBuffer::default())))
                .value(),
        )
    }

    /// Next id for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Infrastructure`] when the repository fails. Nothing
    /// is handed out in that case; the next call retries the refill.
    /// Returns [`IdError::IdSpaceExhausted`] once the scope counter cannot
    /// advance by another step.
    pub async fn next_id(&self, scope: IdScope) -> Result<i64> {
        let buffer = self.buffer(scope);
        let mut buffer = buffer.lock().await;

        if let Some(id) = buffer.take() {
            return Ok(id);
        }

        let range = match self.repository.next_range(scope, self.step).await {
            Ok(range) => range,
            Err(StorageError::Exhausted(_)) => {
                warn!(%scope, step = self.step, "Segment space exhausted");
                return Err(IdError::IdSpaceExhausted(format!("segment scope {scope}")));
            }
            Err(e) => {
                warn!(%scope, error = %e, "Segment refill failed");
                return Err(e.into());
            }
        };
        if range.is_empty() {
            return Err(StorageError::InvalidRange(format!(
                "empty range [{}, {}] for scope {scope}",
                range.min_id, range.max_id
            ))
            .into());
        }
        debug!(%scope, min = range.min_id, max = range.max_id, "Segment refilled");
        buffer.load(range);

        buffer.take().ok_or_else(|| {
            StorageError::InvalidRange(format!("no ids loaded for scope {scope}")).into()
        })
    }

    /// Seed `scope` in the repository unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Infrastructure`] when the repository fails.
    pub async fn init_scope(&self, scope: IdScope, initial_max_id: i64) -> Result<()> {
        self.repository
            .init_scope_if_absent(scope, initial_max_id, self.step)
            .await?;
        Ok(())
    }

    /// Ids left in memory for `scope` before the next round trip.
    pub async fn remaining(&self, scope: IdScope) -> u64 {
        match self.buffers.get(&scope).map(|entry| Arc::clone(entry.value())) {
            Some(buffer) => buffer.lock().await.remaining(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::error::StorageResult;
    use crate::storage::InMemorySegmentRepository;

    struct FailingRepository;

    #[async_trait]
    impl IdSegmentRepository for FailingRepository {
        async fn next_range(&self, _scope: IdScope, _step: u32) -> StorageResult<SegmentRange> {
            Err(StorageError::Unavailable)
        }

        async fn init_scope_if_absent(
            &self,
            _scope: IdScope,
            _initial_max_id: i64,
            _default_step: u32,
        ) -> StorageResult<()> {
            Err(StorageError::Unavailable)
        }

        async fn health_check(&self) -> StorageResult<()> {
            Err(StorageError::Unavailable)
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_zero_step_rejected() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        assert!(matches!(
            SegmentLongIdGenerator::new(repository, 0),
            Err(IdError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_refills_once_per_step() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let generator = SegmentLongIdGenerator::new(repository.clone(), 1000).unwrap();

        for expected in 1..=1000 {
            assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), expected);
        }
        assert_eq!(repository.fetch_count(), 1);
        assert_eq!(generator.remaining(IdScope::Order).await, 0);

        assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), 1001);
        assert_eq!(repository.fetch_count(), 2);
        assert_eq!(generator.remaining(IdScope::Order).await, 999);
    }

    #[tokio::test]
    async fn test_scopes_do_not_share_buffers() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let generator = SegmentLongIdGenerator::new(repository, 10).unwrap();

        assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), 1);
        assert_eq!(generator.next_id(IdScope::Coupon).await.unwrap(), 1);
        assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repository_failure_is_infrastructure_error() {
        let generator = SegmentLongIdGenerator::new(Arc::new(FailingRepository), 10).unwrap();
        let err = generator.next_id(IdScope::Order).await.unwrap_err();
        assert!(matches!(err, IdError::Infrastructure(StorageError::Unavailable)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_counter_near_limit_is_exhausted() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let generator = SegmentLongIdGenerator::new(repository.clone(), 10).unwrap();
        generator
            .init_scope(IdScope::Order, i64::MAX - 5)
            .await
            .unwrap();

        let err = generator.next_id(IdScope::Order).await.unwrap_err();
        assert!(matches!(err, IdError::IdSpaceExhausted(_)));
        assert!(!err.is_retryable());
        assert_eq!(repository.current_max(IdScope::Order), Some(i64::MAX - 5));
    }

    #[tokio::test]
    async fn test_segment_ending_at_limit_drains() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let generator = SegmentLongIdGenerator::new(repository.clone(), 5).unwrap();
        generator
            .init_scope(IdScope::Order, i64::MAX - 5)
            .await
            .unwrap();

        for expected in (i64::MAX - 4)..=i64::MAX {
            assert_eq!(generator.next_id(IdScope::Order).await.unwrap(), expected);
        }
        assert_eq!(generator.remaining(IdScope::Order).await, 0);
        assert!(matches!(
            generator.next_id(IdScope::Order).await,
            Err(IdError::IdSpaceExhausted(_))
        ));
        assert_eq!(repository.current_max(IdScope::Order), Some(i64::MAX));
    }

    #[tokio::test]
    async fn test_two_generators_never_overlap() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let a = SegmentLongIdGenerator::new(repository.clone(), 100).unwrap();
        let b = SegmentLongIdGenerator::new(repository, 100).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..350 {
            assert!(seen.insert(a.next_id(IdScope::Sku).await.unwrap()));
            assert!(seen.insert(b.next_id(IdScope::Sku).await.unwrap()));
        }
        assert_eq!(seen.len(), 700);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_unique() {
        let repository = Arc::new(InMemorySegmentRepository::new());
        let generator = Arc::new(SegmentLongIdGenerator::new(repository, 64).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                tokio::spawn(async move {
                    let mut ids = Vec::with_capacity(500);
                    for _ in 0..500 {
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
        assert_eq!(all.len(), 4000);
        assert_eq!(*all.iter().max().unwrap(), 4000);
    }
}
