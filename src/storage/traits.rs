//! Storage trait definitions.
//!
//! A segment repository owns one durable counter per scope. Every backend must
//! advance that counter in a single atomic step so that no two processes ever
//! receive overlapping ranges.

use async_trait::async_trait;

use crate::domain::{IdScope, SegmentRange};
use crate::error::StorageResult;

/// Durable range allocator behind the segment generator.
#[async_trait]
pub trait IdSegmentRepository: Send + Sync {
    /// Reserve the next `step` ids for `scope`.
    ///
    /// Atomically moves the scope counter from `max` to `max + step` and
    /// returns `[max + 1, max + step]`.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::error::StorageError::NotFound) for a
    /// backend that requires seeding and has not seen `scope`, or any I/O
    /// failure of the backend.
    async fn next_range(&self, scope: IdScope, step: u32) -> StorageResult<SegmentRange>;

    /// Seed `scope` at `initial_max_id` unless it already exists.
    ///
    /// This is idempotent: an existing counter is never modified.
    async fn init_scope_if_absent(
        &self,
        scope: IdScope,
        initial_max_id: i64,
        default_step: u32,
    ) -> StorageResult<()>;

    /// Check if the backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}

/// Trait object alias for [`IdSegmentRepository`].
pub type DynSegmentRepository = dyn IdSegmentRepository;
