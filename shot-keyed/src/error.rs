/// Errors produced while building a limiter.
///
/// Admission decisions never fail: a denied request is a normal `false`
/// from [`crate::Strategy::allow_request`]. Everything here is raised at
/// construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum LimitError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}

/// The specific reason a configuration was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No constructor is registered under this kind tag.
    #[error("unknown strategy kind `{0}`")]
    UnknownKind(String),

    /// A constructor is already registered under this kind tag.
    #[error("strategy kind `{0}` is already registered")]
    DuplicateKind(String),

    /// The strategy needs a parameter that was not supplied.
    #[error("strategy `{kind}` requires parameter `{parameter}`")]
    MissingParameter {
        kind: String,
        parameter: &'static str,
    },

    /// A parameter was zero, negative or not a finite number.
    #[error("parameter `{parameter}` must be a positive, finite value")]
    NotPositive { parameter: &'static str },

    /// Configuration text could not be parsed.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for LimitError {
    fn from(err: serde_json::Error) -> Self {
        LimitError::InvalidConfiguration(ConfigError::Malformed(err.to_string()))
    }
}
