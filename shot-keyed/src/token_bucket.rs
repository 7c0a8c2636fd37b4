use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::Clock;
use crate::clock::saturating_nanos;
use crate::ConfigError;
use crate::KeyedStore;
use crate::LimitError;
use crate::Strategy;
use crate::StrategyParams;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    tokens: f64,
    /// Nanoseconds since the clock anchor.
    last_refill: u64,
}

/// A continuously refilling token bucket, one bucket per key.
///
/// A key seen for the first time starts with a full bucket, so the first
/// burst of up to `capacity` requests is always admitted. Tokens then flow
/// back at `refill_rate` per second, fractionally, and a request is admitted
/// whenever at least one whole token is available.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    idle_ttl: Option<Duration>,
    buckets: KeyedStore<Bucket>,
    clock: Clock,
}

impl Strategy for TokenBucket {
    fn allow_request(&self, key: &str) -> bool {
        let now = self.clock.now_nanos();

        self.buckets.with_entry(
            key,
            || Bucket {
                tokens: self.capacity,
                last_refill: now,
            },
            |bucket| {
                // `now` was read before the lock was taken, so a racing caller
                // may already have recorded a later instant.
                let now = now.max(bucket.last_refill);
                let tokens = self.refilled(bucket, now);

                let allowed = tokens >= 1.0;
                *bucket = Bucket {
                    tokens: if allowed { tokens - 1.0 } else { tokens },
                    last_refill: now,
                };
                allowed
            },
        )
    }

    fn evict_idle(&self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let ttl = saturating_nanos(ttl);
        let now = self.clock.now_nanos();

        // A bucket idle long enough to have refilled completely is
        // indistinguishable from a fresh one.
        let evicted = self.buckets.evict(|bucket| {
            now.saturating_sub(bucket.last_refill) >= ttl
                && self.refilled(bucket, now) >= self.capacity
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "evicted idle token buckets");
        }
        evicted
    }

    fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

impl TokenBucket {
    /// Creates a new `TokenBucket` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum burst size for a single key.
    /// * `refill_rate` - Tokens returned to each bucket per second.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if `refill_rate` is not a
    /// positive, finite number.
    pub fn new(capacity: NonZeroUsize, refill_rate: f64) -> Result<Self, LimitError> {
        Self::with_clock(capacity, refill_rate, Clock::new())
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        refill_rate: f64,
        clock: Clock,
    ) -> Result<Self, LimitError> {
        if !(refill_rate.is_finite() && refill_rate > 0.0) {
            return Err(ConfigError::NotPositive {
                parameter: "refill_rate",
            }
            .into());
        }

        debug!(capacity = capacity.get(), refill_rate, "token bucket created");
        Ok(Self {
            capacity: capacity.get() as f64,
            refill_rate,
            idle_ttl: None,
            buckets: KeyedStore::new(),
            clock,
        })
    }

    /// Allow [`Strategy::evict_idle`] to drop buckets untouched for `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    pub(crate) fn from_params(
        params: &StrategyParams,
        clock: Clock,
    ) -> Result<Arc<dyn Strategy>, LimitError> {
        let capacity = params.require_capacity(crate::TOKEN_BUCKET)?;
        let refill_rate = params.require_refill_rate(crate::TOKEN_BUCKET)?;

        let mut bucket = Self::with_clock(capacity, refill_rate, clock)?;
        if let Some(ttl) = params.checked_idle_ttl()? {
            bucket = bucket.with_idle_ttl(ttl);
        }
        Ok(Arc::new(bucket))
    }

    /// Token count after refilling `bucket` up to `now`, capped at capacity.
    fn refilled(&self, bucket: &Bucket, now: u64) -> f64 {
        let elapsed = Duration::from_nanos(now.saturating_sub(bucket.last_refill));
        (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity)
    }

    #[cfg(test)]
    fn bucket(&self, key: &str) -> Option<Bucket> {
        self.buckets.snapshot(key)
    }
}
