use std::sync::Arc;

use tracing::trace;

use crate::LimitError;
use crate::LimiterConfig;
use crate::Strategy;

/// The handle callers hold to ask for admission.
///
/// Binds exactly one strategy, chosen at construction time, and forwards
/// every decision to it. Cloning is cheap and every clone shares the same
/// per-key state.
#[derive(Debug, Clone)]
pub struct RateLimiterService {
    strategy: Arc<dyn Strategy>,
}

impl RateLimiterService {
    pub fn bind(strategy: Arc<dyn Strategy>) -> Self {
        Self { strategy }
    }

    /// Builds the configured strategy with the built-in registry and binds it.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if the configuration is rejected.
    pub fn from_config(config: &LimiterConfig) -> Result<Self, LimitError> {
        Ok(Self::bind(config.build()?))
    }

    /// Returns `true` if a request for `key` may proceed.
    #[inline]
    pub fn allow(&self, key: &str) -> bool {
        let allowed = self.strategy.allow_request(key);
        trace!(key, allowed, "rate limit decision");
        allowed
    }

    /// See [`Strategy::evict_idle`].
    pub fn evict_idle(&self) -> usize {
        self.strategy.evict_idle()
    }

    pub fn tracked_keys(&self) -> usize {
        self.strategy.tracked_keys()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::Clock;
    use crate::FixedWindow;
    use crate::StrategyParams;
    use crate::StrategyRegistry;
    use crate::TokenBucket;

    // Records every key it is asked about.
    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Strategy for Counting {
        fn allow_request(&self, key: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            key != "blocked"
        }
    }

    #[test]
    fn allow_delegates_to_the_bound_strategy() {
        let strategy = Arc::new(Counting::default());
        let service = RateLimiterService::bind(strategy.clone());

        assert!(service.allow("anyone"));
        assert!(!service.allow("blocked"));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);

        // Strategies without eviction report nothing to evict
        assert_eq!(service.evict_idle(), 0);
    }

    #[test]
    fn clones_share_state() {
        let (clock, _mock) = Clock::mock();
        let bucket = TokenBucket::with_clock(NonZeroUsize::new(2).unwrap(), 1.0, clock).unwrap();
        let service = RateLimiterService::bind(Arc::new(bucket));
        let other = service.clone();

        assert!(service.allow("user"));
        assert!(other.allow("user"));
        assert!(!service.allow("user"));
        assert_eq!(other.tracked_keys(), 1);
    }

    #[test]
    fn strategies_are_swapped_at_construction() {
        let (clock, mock) = Clock::mock();
        let window = FixedWindow::with_clock(
            NonZeroUsize::new(1).unwrap(),
            Duration::from_secs(10),
            clock,
        )
        .unwrap()
        .with_idle_ttl(Duration::from_secs(10));
        let service = RateLimiterService::bind(Arc::new(window));

        assert!(service.allow("user"));
        assert!(!service.allow("user"));

        mock.increment(Duration::from_secs(10));
        assert_eq!(service.evict_idle(), 1);
        assert!(service.allow("user"));
    }

    #[test]
    fn it_builds_from_config() {
        let service = RateLimiterService::from_config(&LimiterConfig::default()).unwrap();
        assert_eq!((0..10).filter(|_| service.allow("user_123")).count(), 5);

        let config = LimiterConfig::new("sliding_window", StrategyParams::default());
        assert!(RateLimiterService::from_config(&config).is_err());
    }

    #[test]
    fn key_isolation_under_both_builtins() {
        let registry = StrategyRegistry::default();
        let (clock, _mock) = Clock::mock();
        let services = [
            registry
                .create_with_clock(
                    crate::TOKEN_BUCKET,
                    &StrategyParams::token_bucket(3, 1.0),
                    clock.clone(),
                )
                .unwrap(),
            registry
                .create_with_clock(
                    crate::FIXED_WINDOW,
                    &StrategyParams::fixed_window(3, Duration::from_secs(10)),
                    clock,
                )
                .unwrap(),
        ]
        .map(RateLimiterService::bind);

        for service in services {
            for _ in 0..10 {
                let _ = service.allow("A");
            }
            assert!(!service.allow("A"));
            assert_eq!((0..3).filter(|_| service.allow("B")).count(), 3);
        }
    }
}
