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
struct Window {
    count: usize,
    /// Nanoseconds since the clock anchor.
    start: u64,
}

/// A simple window-based limiter, one window per key.
///
/// Each key's window opens at the first request observed after the previous
/// window expired, so windows are anchored per key rather than aligned to the
/// wall clock. A request arriving exactly `window_size` after the window
/// opened starts a fresh window.
///
/// Like any fixed window, it is susceptible to "boundary bursts": up to
/// double the limit can be admitted in a short period spanning the end of
/// one window and the start of the next.
#[derive(Debug)]
pub struct FixedWindow {
    limit: usize,
    window_size: u64,
    idle_ttl: Option<Duration>,
    windows: KeyedStore<Window>,
    clock: Clock,
}

impl Strategy for FixedWindow {
    fn allow_request(&self, key: &str) -> bool {
        let now = self.clock.now_nanos();

        self.windows.with_entry(
            key,
            || Window {
                count: 0,
                start: now,
            },
            |window| {
                if now.saturating_sub(window.start) >= self.window_size {
                    *window = Window {
                        count: 0,
                        start: now,
                    };
                }

                if window.count < self.limit {
                    window.count += 1;
                    true
                } else {
                    false
                }
            },
        )
    }

    fn evict_idle(&self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        // An expired window is reset on the next request anyway.
        let horizon = saturating_nanos(ttl).max(self.window_size);
        let now = self.clock.now_nanos();

        let evicted = self
            .windows
            .evict(|window| now.saturating_sub(window.start) >= horizon);
        if evicted > 0 {
            debug!(evicted, remaining = self.windows.len(), "evicted idle fixed windows");
        }
        evicted
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `limit` - The maximum number of requests allowed per key within a single window.
    /// * `window_size` - The duration of the fixed time window.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if `window_size` is zero.
    pub fn new(limit: NonZeroUsize, window_size: Duration) -> Result<Self, LimitError> {
        Self::with_clock(limit, window_size, Clock::new())
    }

    pub fn with_clock(
        limit: NonZeroUsize,
        window_size: Duration,
        clock: Clock,
    ) -> Result<Self, LimitError> {
        if window_size.is_zero() {
            return Err(ConfigError::NotPositive {
                parameter: "window_size",
            }
            .into());
        }

        debug!(limit = limit.get(), ?window_size, "fixed window created");
        Ok(Self {
            limit: limit.get(),
            window_size: saturating_nanos(window_size),
            idle_ttl: None,
            windows: KeyedStore::new(),
            clock,
        })
    }

    /// Allow [`Strategy::evict_idle`] to drop windows that opened at least
    /// `ttl` ago and have since expired.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    pub(crate) fn from_params(
        params: &StrategyParams,
        clock: Clock,
    ) -> Result<Arc<dyn Strategy>, LimitError> {
        let limit = params.require_limit(crate::FIXED_WINDOW)?;
        let window_size = params.require_window_size(crate::FIXED_WINDOW)?;

        let mut window = Self::with_clock(limit, window_size, clock)?;
        if let Some(ttl) = params.checked_idle_ttl()? {
            window = window.with_idle_ttl(ttl);
        }
        Ok(Arc::new(window))
    }

    #[cfg(test)]
    fn window(&self, key: &str) -> Option<Window> {
        self.windows.snapshot(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn mocked(limit: usize, window_size: Duration) -> (FixedWindow, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let rl = FixedWindow::with_clock(NonZeroUsize::new(limit).unwrap(), window_size, clock)
            .unwrap();
        (rl, mock)
    }

    #[test]
    fn it_enforces_limits_and_resets() {
        let (rl, mock) = mocked(3, Duration::from_secs(10));

        assert!(rl.allow_request("user"));
        assert!(rl.allow_request("user"));
        assert!(rl.allow_request("user"));

        mock.increment(Duration::from_secs(5));
        assert!(!rl.allow_request("user"));

        mock.increment(Duration::from_secs(5));
        assert!(rl.allow_request("user"));
        assert_eq!(
            rl.window("user"),
            Some(Window {
                count: 1,
                start: 10_000_000_000
            })
        );
    }

    #[test]
    fn test_exact_window_boundary() {
        let window_size = Duration::from_millis(50);
        let (rl, mock) = mocked(1, window_size);

        assert!(rl.allow_request("user"));

        mock.increment(Duration::from_millis(49));
        assert!(!rl.allow_request("user"));

        // Exactly on the boundary opens a fresh window
        mock.increment(Duration::from_millis(1));
        assert!(rl.allow_request("user"));
    }

    #[test]
    fn denied_requests_do_not_mutate_the_window() {
        let (rl, mock) = mocked(2, Duration::from_secs(10));
        assert!(rl.allow_request("user"));
        mock.increment(Duration::from_secs(1));
        assert!(rl.allow_request("user"));

        let before = rl.window("user").unwrap();
        for _ in 0..5 {
            mock.increment(Duration::from_secs(1));
            assert!(!rl.allow_request("user"));
            assert_eq!(rl.window("user").unwrap(), before);
        }
    }

    #[test]
    fn windows_are_anchored_per_key() {
        let (rl, mock) = mocked(1, Duration::from_secs(10));
        assert!(rl.allow_request("early"));

        mock.increment(Duration::from_secs(6));
        assert!(rl.allow_request("late"));

        // "early" resets at 10s, "late" only at 16s
        mock.increment(Duration::from_secs(4));
        assert!(rl.allow_request("early"));
        assert!(!rl.allow_request("late"));

        mock.increment(Duration::from_secs(6));
        assert!(rl.allow_request("late"));
    }

    #[test]
    fn test_idle_reset_drift() {
        let window_size = Duration::from_secs(1);
        let (rl, mock) = mocked(1, window_size);
        assert!(rl.allow_request("user"));

        // Several windows pass untouched: the next one opens at the request,
        // not at an earlier aligned boundary.
        mock.increment(window_size * 5 + Duration::from_millis(300));
        assert!(rl.allow_request("user"));
        assert_eq!(rl.window("user").unwrap().start, 5_300_000_000);
    }

    #[test]
    fn boundary_burst_admits_up_to_twice_the_limit() {
        let (rl, mock) = mocked(3, Duration::from_secs(10));
        assert!(rl.allow_request("user"));

        mock.increment(Duration::from_millis(9_990));
        assert!(rl.allow_request("user"));
        assert!(rl.allow_request("user"));

        mock.increment(Duration::from_millis(10));
        let burst = (0..10).filter(|_| rl.allow_request("user")).count();
        assert_eq!(burst, 3);
    }

    #[test]
    fn keys_are_isolated() {
        let (rl, _mock) = mocked(1, Duration::from_secs(10));
        assert!(rl.allow_request("a"));
        assert!(!rl.allow_request("a"));
        assert!(rl.allow_request("b"));
        assert!(!rl.allow_request("b"));
    }

    #[test]
    fn it_rejects_a_zero_window() {
        let err = FixedWindow::new(NonZeroUsize::new(1).unwrap(), Duration::ZERO).unwrap_err();
        assert_eq!(
            err,
            LimitError::InvalidConfiguration(ConfigError::NotPositive {
                parameter: "window_size"
            })
        );
    }

    #[test]
    fn very_long_windows_do_not_wrap() {
        // Just past u64::MAX nanoseconds; a truncating cast leaves ~0.29s.
        let (rl, mock) = mocked(1, Duration::from_secs(18_446_744_074));
        assert_eq!(rl.window_size, u64::MAX);

        assert!(rl.allow_request("user"));
        mock.increment(Duration::from_secs(1));
        assert!(!rl.allow_request("user"));
        mock.increment(Duration::from_secs(86_400 * 365));
        assert!(!rl.allow_request("user"));
    }

    #[test]
    fn eviction_waits_for_the_window_to_expire() {
        let (clock, mock) = Clock::mock();
        let rl = FixedWindow::with_clock(
            NonZeroUsize::new(1).unwrap(),
            Duration::from_secs(10),
            clock,
        )
        .unwrap()
        .with_idle_ttl(Duration::from_secs(1));

        assert!(rl.allow_request("user"));
        mock.increment(Duration::from_secs(5));
        assert_eq!(rl.evict_idle(), 0);
        assert!(!rl.allow_request("user"));

        mock.increment(Duration::from_secs(5));
        assert_eq!(rl.evict_idle(), 1);
        assert_eq!(rl.tracked_keys(), 0);
        assert!(rl.allow_request("user"));
    }

    #[test]
    fn test_window_concurrency() {
        let limit = 100;
        let (rl, _mock) = mocked(limit, Duration::from_secs(1));
        let rl = Arc::new(rl);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let rl = Arc::clone(&rl);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..limit).filter(|_| rl.allow_request("shared")).count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, limit);
    }
}
