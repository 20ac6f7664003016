//! Snowflake ID generator.
//!
//! # ID Structure
//!
//! ```text
//! | 1 bit: sign (0) | 41 bits: ms since epoch | 10 bits: node id | 12 bits: sequence |
//! ```
//!
//! IDs from one generator are strictly increasing in call order. When more
//! than 4096 ids are requested within one millisecond, or the clock moves
//! backwards, the generator keeps counting on its own timestamp and borrows
//! milliseconds from the future until the real clock catches up. Clock skew is
//! therefore absorbed rather than reported.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::{IdError, Result};
use crate::service::clock::{Clock, SystemClock};

/// Number of bits used for the timestamp delta.
pub const TIMESTAMP_BITS: u32 = 41;

/// Number of bits used for the node id.
pub const NODE_ID_BITS: u32 = 10;

/// Number of bits used for the per-millisecond sequence.
pub const SEQUENCE_BITS: u32 = 12;

/// Largest node id.
pub const MAX_NODE_ID: i64 = (1 << NODE_ID_BITS) - 1;

/// Largest sequence value.
pub const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;

/// Largest encodable timestamp delta.
pub const MAX_TIMESTAMP_DELTA: i64 = (1 << TIMESTAMP_BITS) - 1;

/// Default epoch: 2024-01-01 00:00:00 UTC.
pub const DEFAULT_EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS;

/// Decoded fields of a Snowflake id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeParts {
    /// Milliseconds since the generator epoch.
    pub timestamp_delta: i64,
    /// Node id.
    pub node_id: i64,
    /// Sequence within the millisecond.
    pub sequence: i64,
}

impl SnowflakeParts {
    /// Split an id into its fields.
    #[must_use]
    pub const fn decode(id: i64) -> Self {
        Self {
            timestamp_delta: id >> TIMESTAMP_SHIFT,
            node_id: (id >> NODE_ID_SHIFT) & MAX_NODE_ID,
            sequence: id & MAX_SEQUENCE,
        }
    }

    /// Pack fields into an id.
    #[must_use]
    pub const fn encode(&self) -> i64 {
        (self.timestamp_delta << TIMESTAMP_SHIFT) | (self.node_id << NODE_ID_SHIFT) | self.sequence
    }
}

/// Mutable state behind the generator lock.
struct SnowflakeState {
    /// Last timestamp used, in absolute milliseconds.
    last_timestamp: i64,
    /// Sequence issued at `last_timestamp`.
    sequence: i64,
}

/// Standalone 64-bit monotonic id generator.
pub struct SnowflakeIdGenerator {
    node_id: i64,
    epoch_ms: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
    /// Create a generator.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] if `node_id` is outside `[0, 1023]`
    /// or `epoch_ms` is negative or later than the clock's current time.
    pub fn new(node_id: i64, epoch_ms: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        if !(0..=MAX_NODE_ID).contains(&node_id) {
            return Err(IdError::Configuration(format!(
                "node_id must be in [0, {MAX_NODE_ID}], got {node_id}"
            )));
        }
        if epoch_ms < 0 {
            return Err(IdError::Configuration(format!(
                "epoch must not be negative, got {epoch_ms}"
            )));
        }
        let now = clock.now_millis();
        if epoch_ms > now {
            return Err(IdError::Configuration(format!(
                "epoch {epoch_ms} is in the future (now {now})"
            )));
        }

        info!(node_id, epoch_ms, "Snowflake generator initialized");

        Ok(Self {
            node_id,
            epoch_ms,
            clock,
            state: Mutex::new(SnowflakeState {
                last_timestamp: -1,
                sequence: 0,
            }),
        })
    }

    /// Create a generator on the system clock and the default epoch.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] for an out-of-range `node_id`.
    pub fn with_node_id(node_id: i64) -> Result<Self> {
        Self::new(node_id, DEFAULT_EPOCH_MS, Arc::new(SystemClock))
    }

    /// Node id stamped into every id.
    #[must_use]
    pub const fn node_id(&self) -> i64 {
        self.node_id
    }

    /// Epoch in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    /// Generate the next id.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::IdSpaceExhausted`] once the 41-bit timestamp field
    /// overflows, and [`IdError::Configuration`] if the clock reads earlier
    /// than the epoch before any id was issued.
    pub fn next_id(&self) -> Result<i64> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        let (timestamp, sequence) = if now > state.last_timestamp {
            (now, 0)
        } else if state.sequence >= MAX_SEQUENCE {
            // Sequence exhausted (or clock behind): borrow the next millisecond.
            (state.last_timestamp + 1, 0)
        } else {
            (state.last_timestamp, state.sequence + 1)
        };

        let delta = timestamp - self.epoch_ms;
        if delta < 0 {
            return Err(IdError::Configuration(format!(
                "clock reads {timestamp}, before epoch {}",
                self.epoch_ms
            )));
        }
        if delta > MAX_TIMESTAMP_DELTA {
            return Err(IdError::IdSpaceExhausted(format!(
                "snowflake timestamp delta {delta} exceeds {TIMESTAMP_BITS} bits"
            )));
        }

        state.last_timestamp = timestamp;
        state.sequence = sequence;

        Ok(SnowflakeParts {
            timestamp_delta: delta,
            node_id: self.node_id,
            sequence,
        }
        .encode())
    }
}
