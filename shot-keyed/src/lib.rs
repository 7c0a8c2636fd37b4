//! # shot-keyed
//!
//! `shot-keyed` provides per-key rate limiting strategies: every caller key
//! (a client id, an API token, a user name) is throttled independently.
//!
//! ## Core Philosophy
//!
//! A keyed limiter lives or dies by contention between unrelated keys. State
//! is held in a sharded map where every key owns its own record and its own
//! lock, so a busy key never stalls a quiet one, while concurrent requests
//! for the same key are still decided one at a time.
//!
//! ## Key Concepts
//!
//! * **Lazy Evaluation**: Tokens and windows are recalculated at the moment of
//!   the request, eliminating the need for background worker threads or timers.
//! * **Strategy Trait**: A unified interface for different limiting algorithms.
//! * **Registry**: Strategies are built by kind tag through a
//!   [`StrategyRegistry`], so new algorithms plug in without touching callers.
//! * **Service**: Callers hold a [`RateLimiterService`] and never care which
//!   algorithm sits behind it.
//!
//! ## Example
//!
//! ```rust
//! use shot_keyed::RateLimiterService;
//! use shot_keyed::StrategyParams;
//! use shot_keyed::StrategyRegistry;
//!
//! let registry = StrategyRegistry::default();
//! let params = StrategyParams::token_bucket(5, 1.0);
//! let limiter = registry.create("token_bucket", &params).unwrap();
//! let service = RateLimiterService::bind(limiter);
//!
//! if service.allow("user_123") {
//!     // Request allowed
//! }
//! ```

use std::fmt::Debug;

mod clock;
mod config;
mod error;
mod fixed_window;
mod registry;
mod service;
mod store;
mod token_bucket;

pub use clock::Clock;
pub use config::LimiterConfig;
pub use config::StrategyParams;
pub use error::ConfigError;
pub use error::LimitError;
pub use fixed_window::FixedWindow;
pub use registry::Constructor;
pub use registry::FIXED_WINDOW;
pub use registry::StrategyRegistry;
pub use registry::TOKEN_BUCKET;
pub use service::RateLimiterService;
pub use store::KeyedStore;
pub use token_bucket::TokenBucket;

/// The core trait for all keyed rate-limiting algorithms.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Strategy: Debug + Send + Sync {
    /// Decides whether a request for `key` may proceed.
    ///
    /// Denial is a normal outcome and is reported as `false`; this never
    /// fails. Calls for the same key are serialised, calls for different
    /// keys do not wait on each other.
    fn allow_request(&self, key: &str) -> bool;

    /// Drops per-key records that no longer influence any decision.
    ///
    /// Returns the number of records removed. Strategies without an
    /// eviction policy keep every key and return 0.
    fn evict_idle(&self) -> usize {
        0
    }

    /// Number of keys for which state is currently held.
    fn tracked_keys(&self) -> usize {
        0
    }
}
