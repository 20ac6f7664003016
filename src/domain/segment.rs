//! Segment range and persisted segment state.

use serde::{Deserialize, Serialize};

/// A contiguous block of ids reserved for one scope. Both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRange {
    /// First id in the range.
    pub min_id: i64,
    /// Last id in the range.
    pub max_id: i64,
}

impl SegmentRange {
    /// Create a new segment range.
    #[must_use]
    pub const fn new(min_id: i64, max_id: i64) -> Self {
        Self { min_id, max_id }
    }

    /// Range reserved by moving a counter from `previous_max` forward by `step`.
    ///
    /// `None` when the range would run past `i64::MAX`.
    #[must_use]
    pub const fn after(previous_max: i64, step: u32) -> Option<Self> {
        match (
            previous_max.checked_add(1),
            previous_max.checked_add(step as i64),
        ) {
            (Some(min_id), Some(max_id)) => Some(Self { min_id, max_id }),
            _ => None,
        }
    }

    /// Range of `step` ids whose last id is `new_max`.
    #[must_use]
    pub const fn ending_at(new_max: i64, step: u32) -> Option<Self> {
        match new_max.checked_sub(step as i64) {
            Some(previous_max) => Self::after(previous_max, step),
            None => None,
        }
    }

    /// Number of ids in the range.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn size(&self) -> u64 {
        if self.max_id < self.min_id {
            0
        } else {
            (self.max_id - self.min_id) as u64 + 1
        }
    }

    /// Check if the range is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether two ranges share any id.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_id <= other.max_id
            && other.min_id <= self.max_id
    }
}

/// Durable counter row for one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentState {
    /// Scope name.
    pub scope: String,

    /// Highest id handed out in any range so far.
    pub max_id: i64,

    /// Step recorded when the scope was seeded.
    pub step: u32,

    /// Version for optimistic locking.
    pub version: u64,

    /// Last update timestamp (milliseconds since epoch).
    pub updated_at: i64,
}

impl SegmentState {
    /// Create a new segment state.
    #[must_use]
    pub fn new(scope: String, initial_max_id: i64, step: u32) -> Self {
        Self {
            scope,
            max_id: initial_max_id,
            step,
            version: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Reserve the next `step` ids and advance the counter.
    ///
    /// Returns `None` and leaves the state untouched when the counter would
    /// overflow.
    pub fn advance(&mut self, step: u32) -> Option<SegmentRange> {
        let range = SegmentRange::after(self.max_id, step)?;
        self.max_id = range.max_id;
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
        Some(range)
    }
}
