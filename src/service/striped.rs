//! Striped ULID generator.
//!
//! Spreads callers over up to 1024 independent [`MonotonicUlidGenerator`]s to
//! cut lock contention. Each stripe pins its index into the low bits of the
//! tail, so stripes never collide with each other. Ordering holds only within
//! a stripe.
//!
//! Callers are routed by a per-thread number, which is stable for the life of
//! an OS thread. Code running on a work-stealing runtime, where a task may
//! resume on another thread, can route by an explicit key with
//! [`StripedUlidGenerator::next_ulid_for_key`] instead.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::domain::{ClockRollbackPolicy, Ulid128};
use crate::error::{IdError, Result};
use crate::service::clock::{Clock, SystemClock};
use crate::service::metrics::{MetricsSink, NoopMetrics};
use crate::service::ulid::{MonotonicUlidGenerator, UlidGenerator};

/// Largest supported stripe count.
pub const MAX_STRIPES: usize = 1024;

static NEXT_THREAD_NUMBER: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_NUMBER: usize = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
}

/// Stable small number for the calling thread.
fn thread_number() -> usize {
    THREAD_NUMBER.with(|n| *n)
}

/// Bits needed to hold `stripes - 1`.
const fn stripe_bits_for(stripes: usize) -> u32 {
    if stripes <= 1 {
        0
    } else {
        usize::BITS - (stripes - 1).leading_zeros()
    }
}

/// ULID generator sharded over independent monotonic stripes.
pub struct StripedUlidGenerator {
    stripes: Vec<MonotonicUlidGenerator>,
    stripe_bits: u32,
    hasher: RandomState,
}

impl StripedUlidGenerator {
    /// Create a generator with `stripes` stripes, clamped to `[1, 1024]`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] when `stripes` is zero.
    pub fn new(
        stripes: usize,
        clock: Arc<dyn Clock>,
        policy: ClockRollbackPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        if stripes == 0 {
            return Err(IdError::Configuration(
                "stripes must be at least 1".to_string(),
            ));
        }
        let count = stripes.min(MAX_STRIPES);
        let stripe_bits = stripe_bits_for(count);

        let stripes = (0..count)
            .map(|index| {
                let index = u32::try_from(index).map_err(|_| {
                    IdError::Configuration(format!("stripe index {index} out of range"))
                })?;
                MonotonicUlidGenerator::with_stripe(
                    Arc::clone(&clock),
                    policy,
                    Arc::clone(&metrics),
                    stripe_bits,
                    index,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(stripes = count, stripe_bits, %policy, "Striped ULID generator created");

        Ok(Self {
            stripes,
            stripe_bits,
            hasher: RandomState::new(),
        })
    }

    /// Generator on the system clock with the default policy and no metrics.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Configuration`] when `stripes` is zero.
    pub fn with_stripes(stripes: usize) -> Result<Self> {
        Self::new(
            stripes,
            Arc::new(SystemClock),
            ClockRollbackPolicy::default(),
            Arc::new(NoopMetrics),
        )
    }

    /// Number of stripes after clamping.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Low bits of `lsb` reserved for the stripe index.
    #[must_use]
    pub const fn stripe_bits(&self) -> u32 {
        self.stripe_bits
    }

    /// Stripe the calling thread is routed to.
    #[must_use]
    pub fn current_stripe(&self) -> usize {
        thread_number() % self.stripes.len()
    }

    /// Generate from the stripe selected by hashing `key`.
    ///
    /// Calls with equal keys land on the same stripe and are ordered.
    ///
    /// # Errors
    ///
    /// See [`UlidGenerator::next_ulid`].
    pub fn next_ulid_for_key<K: Hash + ?Sized>(&self, key: &K) -> Result<Ulid128> {
        self.next_ulid_in(self.stripe_for_key(key))
    }

    /// Stripe that `key` maps to.
    #[must_use]
    pub fn stripe_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let hash = self.hasher.hash_one(key);
        // Truncation is fine: only the remainder matters.
        #[allow(clippy::cast_possible_truncation)]
        let hash = hash as usize;
        hash % self.stripes.len()
    }

    /// Generate from an explicit stripe, taken modulo the stripe count.
    ///
    /// # Errors
    ///
    /// See [`UlidGenerator::next_ulid`].
    pub fn next_ulid_in(&self, stripe: usize) -> Result<Ulid128> {
        self.stripes[stripe % self.stripes.len()].next_ulid()
    }
}

impl UlidGenerator for StripedUlidGenerator {
    fn next_ulid(&self) -> Result<Ulid128> {
        self.next_ulid_in(self.current_stripe())
    }
}
