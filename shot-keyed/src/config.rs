use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;
use crate::LimitError;
use crate::Strategy;
use crate::StrategyRegistry;

/// Construction parameters shared by every strategy.
///
/// Each strategy reads only the fields it understands and rejects the
/// configuration if one it needs is missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Token bucket: maximum burst per key.
    pub capacity: Option<usize>,
    /// Token bucket: tokens returned per second.
    pub refill_rate: Option<f64>,
    /// Fixed window: requests allowed per key per window.
    pub limit: Option<usize>,
    /// Fixed window: length of a window, e.g. `"10s"`.
    #[serde(deserialize_with = "humantime_opt")]
    pub window_size: Option<Duration>,
    /// Minimum idleness before a key's state may be evicted.
    #[serde(deserialize_with = "humantime_opt")]
    pub idle_ttl: Option<Duration>,
}

fn humantime_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| humantime::parse_duration(&text).map_err(serde::de::Error::custom))
        .transpose()
}

impl StrategyParams {
    pub fn token_bucket(capacity: usize, refill_rate: f64) -> Self {
        Self {
            capacity: Some(capacity),
            refill_rate: Some(refill_rate),
            ..Self::default()
        }
    }

    pub fn fixed_window(limit: usize, window_size: Duration) -> Self {
        Self {
            limit: Some(limit),
            window_size: Some(window_size),
            ..Self::default()
        }
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    pub(crate) fn require_capacity(&self, kind: &str) -> Result<NonZeroUsize, LimitError> {
        non_zero(require(self.capacity, kind, "capacity")?, "capacity")
    }

    pub(crate) fn require_limit(&self, kind: &str) -> Result<NonZeroUsize, LimitError> {
        non_zero(require(self.limit, kind, "limit")?, "limit")
    }

    pub(crate) fn require_refill_rate(&self, kind: &str) -> Result<f64, LimitError> {
        require(self.refill_rate, kind, "refill_rate")
    }

    pub(crate) fn require_window_size(&self, kind: &str) -> Result<Duration, LimitError> {
        require(self.window_size, kind, "window_size")
    }

    pub(crate) fn checked_idle_ttl(&self) -> Result<Option<Duration>, LimitError> {
        match self.idle_ttl {
            Some(ttl) if ttl.is_zero() => Err(ConfigError::NotPositive {
                parameter: "idle_ttl",
            }
            .into()),
            ttl => Ok(ttl),
        }
    }
}

fn require<T>(value: Option<T>, kind: &str, parameter: &'static str) -> Result<T, LimitError> {
    value.ok_or_else(|| {
        ConfigError::MissingParameter {
            kind: kind.to_owned(),
            parameter,
        }
        .into()
    })
}

fn non_zero(value: usize, parameter: &'static str) -> Result<NonZeroUsize, LimitError> {
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::NotPositive { parameter }.into())
}

/// A strategy kind plus its parameters, as read from a configuration file.
///
/// ```json
/// { "kind": "fixed_window", "limit": 5, "window_size": "10s" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimiterConfig {
    pub kind: String,
    #[serde(flatten)]
    pub params: StrategyParams,
}

impl LimiterConfig {
    pub fn new(kind: impl Into<String>, params: StrategyParams) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self, LimitError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the configured strategy using the built-in registry.
    pub fn build(&self) -> Result<Arc<dyn Strategy>, LimitError> {
        StrategyRegistry::default().create(&self.kind, &self.params)
    }
}

impl Default for LimiterConfig {
    /// Five request bursts, refilled at one request per second.
    fn default() -> Self {
        Self::new(crate::TOKEN_BUCKET, StrategyParams::token_bucket(5, 1.0))
    }
}
