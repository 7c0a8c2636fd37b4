use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use dashmap::DashMap;

/// Per-key state owned by a single strategy instance.
///
/// The map is sharded, and every record carries its own lock. Reaching an
/// existing key only takes a shared guard on its shard, so two callers
/// only ever wait for each other when they use the same key. Records are
/// created on first use and are never handed out: all access goes through
/// [`KeyedStore::with_entry`], which makes each read-modify-write atomic
/// for that key.
#[derive(Debug)]
pub struct KeyedStore<S> {
    entries: DashMap<String, Mutex<S>>,
}

// A panic in another caller cannot leave a record half-written: the
// records are plain numbers updated in one assignment.
fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S> KeyedStore<S> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Runs `update` against the record for `key`, creating it with `init`
    /// if this is the first time the key has been seen.
    pub fn with_entry<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> S,
        update: impl FnOnce(&mut S) -> R,
    ) -> R {
        if let Some(entry) = self.entries.get(key) {
            return update(&mut *lock(entry.value()));
        }

        // Another caller may insert the same key between the lookup above and
        // here; `or_insert_with` keeps whichever record landed first.
        let entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Mutex::new(init()))
            .downgrade();
        update(&mut *lock(entry.value()))
    }

    /// Removes every record for which `expired` returns true.
    ///
    /// Returns the number of records removed.
    pub fn evict(&self, mut expired: impl FnMut(&S) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| {
            let state: &S = state.get_mut().unwrap_or_else(PoisonError::into_inner);
            !expired(state)
        });
        before.saturating_sub(self.entries.len())
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone> KeyedStore<S> {
    /// A copy of the record for `key`, if it exists.
    pub fn snapshot(&self, key: &str) -> Option<S> {
        self.entries
            .get(key)
            .map(|entry| lock(entry.value()).clone())
    }
}

impl<S> Default for KeyedStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
