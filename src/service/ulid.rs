//! Monotonic ULID generator.
//!
//! Within one millisecond the 80-bit tail is incremented instead of redrawn,
//! so ids from one instance are strictly increasing in call order. A new
//! millisecond starts from a fresh random tail.
//!
//! A generator may own a *stripe*: the low `stripe_bits` of every tail are
//! pinned to the stripe index and increments step over them. Ids from
//! different stripes can then never collide, see
//! [`StripedUlidGenerator`](super::striped::StripedUlidGenerator).

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::Rng;
use tracing::warn;

use crate::domain::ulid::{MAX_TIMESTAMP, TAIL_MASK};
use crate::domain::{ClockRollbackPolicy, Ulid128};
use crate::error::{IdError, Result};
use crate::service::clock::{Clock, SystemClock};
use crate::service::metrics::{MetricsSink, NoopMetrics};

/// Largest supported number of stripe bits (1024 stripes).
pub const MAX_STRIPE_BITS: u32 = 10;

/// Anything that hands out ULIDs.
pub trait UlidGenerator: Send + Sync {
    /// Generate the next ULID.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::ClockRollback`] under a fail-fast policy when the
    /// clock moved back past its threshold.
    fn next_ulid(&self) -> Result<Ulid128>;

    /// Generate the next ULID as a 26-character string.
    ///
    /// # Errors
    ///
    /// See [`UlidGenerator::next_ulid`].
    fn next_ulid_string(&self) -> Result<String> {
        self.next_ulid().map(|ulid| ulid.to_string())
    }

    /// Generate the next ULID as 16 big-endian bytes.
    ///
    /// # Errors
    ///
    /// See [`UlidGenerator::next_ulid`].
    fn next_ulid_bytes(&self) -> Result<[u8; 16]> {
        self.next_ulid().map(|ulid| ulid.to_bytes())
    }
}

struct MonotonicState {
    last_timestamp: i64,
    last_tail: u128,
}

/// Single-lock monotonic ULID generator.
pub struct MonotonicUlidGenerator {
    clock: Arc<dyn Clock>,
    policy: ClockRollbackPolicy,
    metrics: Arc<dyn MetricsSink>,
    stripe_mask: u128,
    stripe_index: u128,
    increment: u128,
    state: Mutex<MonotonicState>,
}

impl MonotonicUlidGenerator {
    /// Create an unstriped generator.
    pub fn new(
        clock: Arc<dyn Clock>,
        policy: ClockRollbackPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            clock,
            policy,
            metrics,
            stripe_mask: 0,
            stripe_index: 0,
            increment: 1,
            state: Mutex::new(MonotonicState {
                last_timestamp: -1,
                last_tail: 0,
            }),
        }
    }

    /// Create a generator that owns stripe `stripe_index` of `2^stripe_bits`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] if `stripe_bits` exceeds
    /// [`MAX_STRIPE_BITS`] or `stripe_index` does not fit in `stripe_bits`.
    pub fn with_stripe(
        clock: Arc<dyn Clock>,
        policy: ClockRollbackPolicy,
        metrics: Arc<dyn MetricsSink>,
        stripe_bits: u32,
        stripe_index: u32,
    ) -> Result<Self> {
        if stripe_bits > MAX_STRIPE_BITS {
            return Err(IdError::Configuration(format!(
                "stripe_bits must be at most {MAX_STRIPE_BITS}, got {stripe_bits}"
            )));
        }
        if u128::from(stripe_index) >> stripe_bits != 0 {
            return Err(IdError::Configuration(format!(
                "stripe index {stripe_index} does not fit in {stripe_bits} bits"
            )));
        }

        let mut generator = Self::new(clock, policy, metrics);
        generator.stripe_mask = (1u128 << stripe_bits) - 1;
        generator.stripe_index = u128::from(stripe_index);
        generator.increment = 1u128 << stripe_bits;
        Ok(generator)
    }

    /// Generator on the system clock with the default policy and no metrics.
    #[must_use]
    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemClock),
            ClockRollbackPolicy::default(),
            Arc::new(NoopMetrics),
        )
    }

    /// Rollback policy in effect.
    #[must_use]
    pub const fn policy(&self) -> ClockRollbackPolicy {
        self.policy
    }

    fn fresh_tail(&self) -> u128 {
        let random: u128 = rand::rng().random();
        ((random & TAIL_MASK) & !self.stripe_mask) | self.stripe_index
    }
}

impl UlidGenerator for MonotonicUlidGenerator {
    fn next_ulid(&self) -> Result<Ulid128> {
        let started = Instant::now();
        let now = self.clock.now_millis();
        if !(0..=MAX_TIMESTAMP).contains(&now) {
            return Err(IdError::IdSpaceExhausted(format!(
                "clock value {now} does not fit in a 48-bit ULID timestamp"
            )));
        }

        let mut state = self.state.lock();

        if now > state.last_timestamp {
            state.last_timestamp = now;
            state.last_tail = self.fresh_tail();
        } else {
            if now < state.last_timestamp {
                let rollback_ms = state.last_timestamp - now;
                self.metrics.record_rollback(rollback_ms);
                if let ClockRollbackPolicy::FailFast { threshold_ms } = self.policy
                    && rollback_ms > threshold_ms
                {
                    warn!(rollback_ms, threshold_ms, "Clock rollback exceeds threshold");
                    return Err(IdError::ClockRollback {
                        rollback_ms,
                        threshold_ms,
                    });
                }
            }

            let next = state.last_tail + self.increment;
            if next > TAIL_MASK {
                // Tail exhausted within this millisecond: carry into the timestamp.
                if state.last_timestamp >= MAX_TIMESTAMP {
                    return Err(IdError::IdSpaceExhausted(
                        "ULID timestamp overflow".to_string(),
                    ));
                }
                state.last_timestamp += 1;
                state.last_tail = next & TAIL_MASK;
            } else {
                state.last_tail = next;
            }
        }

        let ulid = Ulid128::from_parts(state.last_timestamp, state.last_tail);
        drop(state);

        self.metrics.record_generated(started.elapsed());
        Ok(ulid)
    }
}
