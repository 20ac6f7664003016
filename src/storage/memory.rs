//! In-memory segment repository.
//!
//! Not durable: counters restart from zero with the process. Scopes are seeded
//! on first use. Useful for tests and single-process tools.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{IdScope, SegmentRange, SegmentState};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::IdSegmentRepository;

/// Process-local segment repository.
#[derive(Debug, Default)]
pub struct InMemorySegmentRepository {
    states: DashMap<IdScope, SegmentState>,
    fetches: AtomicU64,
}

impl InMemorySegmentRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `next_range` calls served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Current counter for `scope`, if seeded.
    pub fn current_max(&self, scope: IdScope) -> Option<i64> {
        self.states.get(&scope).map(|state| state.max_id)
    }
}

#[async_trait]
impl IdSegmentRepository for InMemorySegmentRepository {
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let mut state = self
            .states
            .entry(scope)
            .or_insert_with(|| SegmentState::new(scope.scope_name().to_string(), 0, step));
        state
            .advance(step)
            .ok_or_else(|| StorageError::Exhausted(scope.scope_name().to_string()))
    }

    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()> {
        self.states.entry(scope).or_insert_with(|| {
            SegmentState::new(scope.scope_name().to_string(), initial_max_id, default_step)
        });
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ranges_are_contiguous() {
        let repo = InMemorySegmentRepository::new();
        let first = repo.next_range(IdScope::Order, 10).await.unwrap();
        let second = repo.next_range(IdScope::Order, 10).await.unwrap();
        assert_eq!(first, SegmentRange::new(1, 10));
        assert_eq!(second, SegmentRange::new(11, 20));
        assert_eq!(repo.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let repo = InMemorySegmentRepository::new();
        repo.init_scope_if_absent(IdScope::Coupon, 500, 100)
            .await
            .unwrap();
        repo.init_scope_if_absent(IdScope::Coupon, 0, 100)
            .await
            .unwrap();
        assert_eq!(repo.current_max(IdScope::Coupon), Some(500));

        let range = repo.next_range(IdScope::Coupon, 100).await.unwrap();
        assert_eq!(range, SegmentRange::new(501, 600));
    }

    #[tokio::test]
    async fn test_exhausted_scope_is_not_advanced() {
        let repo = InMemorySegmentRepository::new();
        repo.init_scope_if_absent(IdScope::Order, i64::MAX - 5, 10)
            .await
            .unwrap();

        let err = repo.next_range(IdScope::Order, 10).await.unwrap_err();
        assert!(matches!(err, StorageError::Exhausted(_)));
        assert_eq!(repo.current_max(IdScope::Order), Some(i64::MAX - 5));

        let range = repo.next_range(IdScope::Order, 5).await.unwrap();
        assert_eq!(range, SegmentRange::new(i64::MAX - 4, i64::MAX));
    }

    #[test]
    fn test_scopes_are_independent() {
        let repo = InMemorySegmentRepository::new();
        tokio_test::block_on(async {
            repo.next_range(IdScope::Order, 5).await.unwrap();
            let range = repo.next_range(IdScope::User, 5).await.unwrap();
            assert_eq!(range.min_id, 1);
            assert!(repo.health_check().await.is_ok());
        });
        assert_eq!(repo.current_max(IdScope::Tenant), None);
    }
}
