//! Ontology display names shared by every session in the process.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Acronym → full ontology name. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct OntologyNameCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl OntologyNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance used by default-constructed clients.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<OntologyNameCache> = OnceLock::new();
        GLOBAL.get_or_init(OntologyNameCache::new).clone()
    }

    pub fn get(&self, acronym: &str) -> Option<String> {
        self.inner.read().get(acronym).cloned()
    }

    pub fn insert(&self, acronym: &str, name: &str) {
        self.inner
            .write()
            .insert(acronym.to_string(), name.to_string());
    }

    /// Cached name, or resolve with `fetch` and remember the result.
    ///
    /// `fetch` runs without the lock held; if two sessions race, the first
    /// insert wins.
    pub fn get_or_fetch<F>(&self, acronym: &str, fetch: F) -> String
    where
        F: FnOnce() -> String,
    {
        if let Some(name) = self.get(acronym) {
            return name;
        }
        let fetched = fetch();
        self.inner
            .write()
            .entry(acronym.to_string())
            .or_insert(fetched)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
