//! The shared model table.
//!
//! Models are keyed by lower-cased name and stored behind [`Arc`] so running
//! effects keep a consistent view of a model even if it is replaced or
//! deleted mid-playback. Temporary models carry an expiry and are reaped by
//! [`ModelTable::take_expired`].

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::model::Model;

#[derive(Debug)]
struct TableEntry {
    model: Arc<Model>,
    /// Unix milliseconds after which a temporary model is dropped.
    expires_at_ms: Option<u64>,
}

/// Concurrent, case-insensitive registry of playable models.
#[derive(Debug, Default)]
pub struct ModelTable {
    models: DashMap<String, TableEntry>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl ModelTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
        }
    }

    /// Insert or replace a model. Returns the replaced model, if any.
    pub fn insert(&self, model: Model) -> Option<Arc<Model>> {
        self.insert_entry(model, None)
    }

    /// Insert a model that is dropped once `expires_at_ms` has passed.
    pub fn insert_temporary(&self, model: Model, expires_at_ms: u64) -> Option<Arc<Model>> {
        self.insert_entry(model, Some(expires_at_ms))
    }

    fn insert_entry(&self, model: Model, expires_at_ms: Option<u64>) -> Option<Arc<Model>> {
        let name = key(model.name());
        debug!(model = %name, animated = model.is_animated(), temporary = expires_at_ms.is_some(), "model registered");
        self.models
            .insert(
                name,
                TableEntry {
                    model: Arc::new(model),
                    expires_at_ms,
                },
            )
            .map(|old| old.model)
    }

    /// Returns `true` if a model with this name exists.
    #[must_use]
    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(&key(name))
    }

    /// Look up a model by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(&key(name)).map(|e| Arc::clone(&e.model))
    }

    /// Remove a model by name.
    pub fn remove(&self, name: &str) -> Option<Arc<Model>> {
        self.models.remove(&key(name)).map(|(_, e)| e.model)
    }

    /// Registered model names (lower-cased), sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Every registered model.
    #[must_use]
    pub fn models(&self) -> Vec<Arc<Model>> {
        self.models.iter().map(|e| Arc::clone(&e.model)).collect()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Replace the whole table with `models` and return the names that were
    /// dropped. New models are inserted before stale ones are removed, so a
    /// name present in both sets is never missing from the table.
    pub fn replace_all(&self, models: Vec<Model>) -> Vec<String> {
        let keep: HashSet<String> = models.iter().map(|m| key(m.name())).collect();
        for model in models {
            self.insert(model);
        }
        let stale: Vec<String> = self
            .models
            .iter()
            .map(|e| e.key().clone())
            .filter(|name| !keep.contains(name))
            .collect();
        for name in &stale {
            self.models.remove(name);
        }
        stale
    }

    /// Remove expired temporary models and return their names.
    pub fn take_expired(&self, now_ms: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .models
            .iter()
            .filter(|e| e.expires_at_ms.is_some_and(|at| at <= now_ms))
            .map(|e| e.key().clone())
            .collect();
        for name in &expired {
            self.models.remove(name);
        }
        expired
    }
}
