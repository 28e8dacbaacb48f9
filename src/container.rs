//! Shared resource container handed to plugins during setup.
//!
//! Plugins construct resources (database handles, metric registries) once
//! during `setup` and publish them here for downstream consumers. Entries
//! are keyed by type, one instance per type.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Container {
    entries: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a resource, replacing any previous instance of the same type.
    pub fn put<T: Any + Send + Sync>(&self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .map(|entry| entry.value().clone())
            .and_then(|any| any.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DbHandle {
        dsn: String,
    }

    #[test]
    fn test_put_and_get_typed() {
        let container = Container::new();
        container.put(DbHandle {
            dsn: "sqlite://test".to_string(),
        });

        let handle = container.get::<DbHandle>().unwrap();
        assert_eq!(handle.dsn, "sqlite://test");
        assert!(container.contains::<DbHandle>());
    }

    #[test]
    fn test_missing_type_returns_none() {
        let container = Container::new();
        assert!(container.get::<DbHandle>().is_none());
        assert!(container.is_empty());
    }

    #[test]
    fn test_put_replaces_previous_instance() {
        let container = Container::new();
        container.put(DbHandle {
            dsn: "first".to_string(),
        });
        container.put(DbHandle {
            dsn: "second".to_string(),
        });

        assert_eq!(container.len(), 1);
        assert_eq!(container.get::<DbHandle>().unwrap().dsn, "second");
    }
}
