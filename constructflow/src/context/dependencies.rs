//! Heterogeneous dependency bag carried by execution contexts.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type Entry = Arc<dyn Any + Send + Sync>;

/// Well-known key of the evidence ledger dependency.
pub const EVIDENCE_LEDGER: &str = "evidence_ledger";

/// A string-keyed bag of shared, typed dependencies.
///
/// Bags are immutable once shared: [`Dependencies::merged`] produces a new
/// bag and leaves both inputs untouched, so a `provide` only affects its own
/// subtree.
#[derive(Clone, Default)]
pub struct Dependencies {
    entries: Arc<HashMap<String, Entry>>,
}

impl Dependencies {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency, replacing any existing entry under `key`.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a dependency, replacing any existing entry under `key`.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        Arc::make_mut(&mut self.entries).insert(key.into(), Arc::new(value));
    }

    /// Returns the dependency under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).cloned()?.downcast::<T>().ok()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a new bag with `partial` layered over `self`.
    #[must_use]
    pub fn merged(&self, partial: &Self) -> Self {
        if partial.is_empty() {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.extend(
            partial
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v))),
        );
        Self {
            entries: Arc::new(entries),
        }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("keys", &self.keys())
            .finish()
    }
}
