use std::sync::Arc;
use std::time::Duration;

use quanta::Instant;
use quanta::Mock;

/// Monotonic time source shared by every strategy.
///
/// Wraps a [`quanta::Clock`] and reports time as nanoseconds elapsed since
/// the clock was created. Strategies store these offsets rather than
/// `Instant`s, which keeps per-key state down to plain integers.
#[derive(Debug, Clone)]
pub struct Clock {
    inner: quanta::Clock,
    anchor: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self::from_quanta(quanta::Clock::new())
    }

    /// A clock that only moves when the returned [`Mock`] is advanced.
    pub fn mock() -> (Self, Arc<Mock>) {
        let (clock, mock) = quanta::Clock::mock();
        (Self::from_quanta(clock), mock)
    }

    pub fn from_quanta(inner: quanta::Clock) -> Self {
        let anchor = inner.now();
        Self { inner, anchor }
    }

    /// Nanoseconds since this clock was created.
    #[inline]
    pub fn now_nanos(&self) -> u64 {
        saturating_nanos(self.inner.now().duration_since(self.anchor))
    }
}

/// `d` in nanoseconds, clamped to `u64::MAX` (about 584 years).
#[inline]
pub(crate) fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
