/// Errors produced by the Tower Shot Keyed middleware.
///
/// Errors returned by the wrapped service are passed through unchanged; only
/// decisions made by the limiter itself surface as a `ShotError`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ShotError {
    /// The request was rejected because its key is over its rate limit.
    ///
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`.
    #[error("Rate limit exceeded for key `{key}`")]
    RateLimited {
        /// The key the request was throttled under.
        key: String,
    },
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ShotError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        };

        (status, self.to_string()).into_response()
    }
}
