use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use shot_keyed::RateLimiterService;

use crate::error::ShotError;

/// Derives the rate limiting key for a request.
///
/// Implemented for any `Fn(&Req) -> String`, so a closure picking a header,
/// a peer address or a user id is usually all that is needed.
pub trait KeyExtractor<Req> {
    fn extract(&self, req: &Req) -> String;
}

impl<Req, F> KeyExtractor<Req> for F
where
    F: Fn(&Req) -> String,
{
    fn extract(&self, req: &Req) -> String {
        self(req)
    }
}

#[derive(Clone, Debug)]
struct KeyedRateLimitMetrics {
    decisions: Counter<u64>,
}

/// Rejects requests whose key is over its limit before they reach `inner`.
///
/// Readiness is entirely that of the inner service: the decision is made in
/// `call`, where the key is known, and a rejected request never reaches the
/// inner service.
#[derive(Debug)]
pub struct KeyedRateLimitService<K, S> {
    inner: S,
    limiter: RateLimiterService,
    extractor: K,
    instruments: KeyedRateLimitMetrics,
}

// Manually implement Clone so that only K and S need to be Clone
impl<K, S> Clone for KeyedRateLimitService<K, S>
where
    K: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            extractor: self.extractor.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

impl<K, S> KeyedRateLimitService<K, S> {
    pub fn new(inner: S, limiter: RateLimiterService, extractor: K) -> Self {
        let meter = global::meter("keyed_rate_limit_service");
        let instruments = KeyedRateLimitMetrics {
            decisions: meter.u64_counter("keyed_rate_limit_decisions").build(),
        };

        Self {
            inner,
            limiter,
            extractor,
            instruments,
        }
    }
}

pin_project! {
    #[project = ResponseStateProj]
    enum ResponseState<F> {
        Admitted { #[pin] future: F },
        Rejected { error: ShotError },
    }
}

pin_project! {
    /// Either the inner service's future, or an immediate rejection.
    pub struct ResponseFuture<F> {
        #[pin]
        state: ResponseState<F>,
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().state.project() {
            ResponseStateProj::Admitted { future } => future.poll(cx).map_err(Into::into),
            ResponseStateProj::Rejected { error } => Poll::Ready(Err(error.clone().into())),
        }
    }
}

impl<K, S, Req> Service<Req> for KeyedRateLimitService<K, S>
where
    K: KeyExtractor<Req>,
    S: Service<Req>,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = self.extractor.extract(&req);

        let state = if self.limiter.allow(&key) {
            self.instruments
                .decisions
                .add(1, &[KeyValue::new("outcome", "allowed")]);
            ResponseState::Admitted {
                future: self.inner.call(req),
            }
        } else {
            self.instruments
                .decisions
                .add(1, &[KeyValue::new("outcome", "blocked")]);
            debug!(%key, "request rate limited");
            ResponseState::Rejected {
                error: ShotError::RateLimited { key },
            }
        };

        ResponseFuture { state }
    }
}
