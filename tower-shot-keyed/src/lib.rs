//! # Tower Shot Keyed
//!
//! `tower-shot-keyed` puts a [`shot_keyed`] limiter in front of any
//! [Tower](https://github.com/tower-rs/tower) service.
//!
//! Each request is mapped to a key by a [`KeyExtractor`] (usually a closure
//! reading a header or a peer address). Requests whose key is within its
//! limit are passed to the inner service; the rest fail immediately with
//! [`ShotError::RateLimited`] and the inner service never sees them.
//!
//! ```rust
//! use shot_keyed::LimiterConfig;
//! use shot_keyed::RateLimiterService;
//! use tower::ServiceBuilder;
//! use tower::service_fn;
//! use tower_shot_keyed::KeyedRateLimitLayer;
//!
//! let limiter = RateLimiterService::from_config(&LimiterConfig::default()).unwrap();
//! let svc = ServiceBuilder::new()
//!     .layer(KeyedRateLimitLayer::new(limiter, |client: &String| client.clone()))
//!     .service(service_fn(|client: String| async move {
//!         Ok::<_, tower::BoxError>(format!("hello {client}"))
//!     }));
//! # drop(svc);
//! ```
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`ShotError`], converting a
//!   rejection into `429 Too Many Requests`.

mod error;
mod layer;
mod service;


pub use error::ShotError;
pub use layer::KeyedRateLimitLayer;
pub use service::KeyExtractor;
pub use service::KeyedRateLimitService;
pub use service::ResponseFuture;
