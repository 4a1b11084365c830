//! Lazily created singletons shared by every plugin of one orchestrator.
//!
//! Channels and methods live here: the first plugin asking for a given
//! declaration creates it, every later caller gets the same instance.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use hostkit_core::error::AppError;
use hostkit_core::result::AppResult;

type SharedValue = Arc<dyn Any + Send + Sync>;

/// Type-keyed map of shared singletons.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    entries: DashMap<TypeId, SharedValue>,
}

impl SharedRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `T` singleton, creating it with `init` on first use.
    ///
    /// `init` runs while the entry is locked and must not access the
    /// registry itself.
    pub fn get_or_init<T, F>(&self, init: F) -> AppResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let value = self
            .entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                trace!(kind = %type_name::<T>(), "Creating shared singleton");
                Arc::new(init()) as SharedValue
            })
            .value()
            .clone();
        value.downcast::<T>().map_err(|_| {
            AppError::internal(format!(
                "Shared entry for '{}' holds an unexpected type",
                type_name::<T>()
            ))
        })
    }

    /// Returns the `T` singleton if it was already created.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Number of singletons created so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing was created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every singleton.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counter(AtomicUsize);

    #[test]
    fn test_init_runs_once() {
        let shared = SharedRegistry::new();
        let first = shared.get_or_init(Counter::default).unwrap();
        first.0.fetch_add(1, Ordering::SeqCst);
        let second = shared
            .get_or_init(|| -> Counter { panic!("must not re-create") })
            .unwrap();
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_get_before_init() {
        let shared = SharedRegistry::new();
        assert!(shared.get::<Counter>().is_none());
        shared.get_or_init(Counter::default).unwrap();
        assert!(shared.get::<Counter>().is_some());
    }
}
