use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::Clock;
use crate::ConfigError;
use crate::FixedWindow;
use crate::LimitError;
use crate::Strategy;
use crate::StrategyParams;
use crate::TokenBucket;

/// Kind tag of the built-in [`TokenBucket`] strategy.
pub const TOKEN_BUCKET: &str = "token_bucket";

/// Kind tag of the built-in [`FixedWindow`] strategy.
pub const FIXED_WINDOW: &str = "fixed_window";

/// Builds a strategy from parameters and a clock.
pub type Constructor =
    Arc<dyn Fn(&StrategyParams, Clock) -> Result<Arc<dyn Strategy>, LimitError> + Send + Sync>;

/// Maps strategy kind tags to their constructors.
///
/// Adding an algorithm is a call to [`StrategyRegistry::register`]; nothing
/// that consumes strategies needs to change. Kind tags are case-insensitive.
#[derive(Clone)]
pub struct StrategyRegistry {
    constructors: HashMap<String, Constructor>,
}

fn normalise(kind: &str) -> String {
    kind.trim().to_ascii_lowercase()
}

impl StrategyRegistry {
    /// A registry with no strategies at all.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry holding the built-in `token_bucket` and `fixed_window` kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .constructors
            .insert(TOKEN_BUCKET.to_string(), Arc::new(TokenBucket::from_params));
        registry
            .constructors
            .insert(FIXED_WINDOW.to_string(), Arc::new(FixedWindow::from_params));
        registry
    }

    /// Registers `constructor` under `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKind`] if `kind` is already taken.
    pub fn register<F>(&mut self, kind: &str, constructor: F) -> Result<(), LimitError>
    where
        F: Fn(&StrategyParams, Clock) -> Result<Arc<dyn Strategy>, LimitError>
            + Send
            + Sync
            + 'static,
    {
        let kind = normalise(kind);
        if self.constructors.contains_key(&kind) {
            return Err(ConfigError::DuplicateKind(kind).into());
        }
        debug!(%kind, "strategy kind registered");
        self.constructors.insert(kind, Arc::new(constructor));
        Ok(())
    }

    /// Builds a fresh strategy of the given kind, with no per-key state.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if the kind is unknown or
    /// the parameters do not suit it.
    pub fn create(
        &self,
        kind: &str,
        params: &StrategyParams,
    ) -> Result<Arc<dyn Strategy>, LimitError> {
        self.create_with_clock(kind, params, Clock::new())
    }

    pub fn create_with_clock(
        &self,
        kind: &str,
        params: &StrategyParams,
        clock: Clock,
    ) -> Result<Arc<dyn Strategy>, LimitError> {
        let constructor = self
            .constructors
            .get(&normalise(kind))
            .ok_or_else(|| ConfigError::UnknownKind(kind.to_owned()))?;
        let strategy = constructor(params, clock)?;
        debug!(kind, ?strategy, "strategy created");
        Ok(strategy)
    }

    /// Registered kind tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
