use shot_keyed::RateLimiterService;
use tower::Layer;

use crate::service::KeyedRateLimitService;

/// Applies a per-key Rate Limit to requests.
#[derive(Debug, Clone)]
pub struct KeyedRateLimitLayer<K> {
    limiter: RateLimiterService,
    extractor: K,
}

impl<K> KeyedRateLimitLayer<K> {
    /// Create a KeyedRateLimitLayer
    ///
    /// Every service produced by this layer shares `limiter`, so a key is
    /// limited across all of them.
    pub fn new(limiter: RateLimiterService, extractor: K) -> Self {
        KeyedRateLimitLayer { limiter, extractor }
    }
}

impl<K, S> Layer<S> for KeyedRateLimitLayer<K>
where
    K: Clone,
{
    type Service = KeyedRateLimitService<K, S>;

    fn layer(&self, service: S) -> Self::Service {
        KeyedRateLimitService::new(service, self.limiter.clone(), self.extractor.clone())
    }
}
