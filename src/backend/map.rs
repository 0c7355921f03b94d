//! Unbounded hash map backend.

use std::collections::HashMap;
use std::hash::Hash;

use super::Backend;

/// The default backend: a plain `HashMap` that never evicts.
///
/// Lookups do not track recency. Entries only leave through explicit
/// removal, `purge`, or the owning cache's cleaner. Suitable when key
/// cardinality is finite; otherwise prefer an evicting backend.
#[derive(Debug)]
pub(crate) struct MapBackend<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> MapBackend<K, V> {
    pub(crate) fn with_capacity(initial_capacity: usize) -> Self {
        Self { entries: HashMap::with_capacity(initial_capacity) }
    }
}

impl<K, V> Backend<K, V> for MapBackend<K, V>
where
    K: Eq + Hash + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    fn remove_if(&mut self, predicate: &mut dyn FnMut(&K, &V) -> bool) {
        self.entries.retain(|key, value| !predicate(key, value));
    }

    fn purge(&mut self) {
        // clear() keeps the allocated table, so a purged cache does not pay
        // to grow again.
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the map backend.
    use super::*;

    /// Validates `MapBackend` behavior for the basic operations scenario.
    ///
    /// Assertions:
    /// - Confirms `get` returns inserted values and `None` for absent keys.
    /// - Confirms `remove` drops the entry.
    #[test]
    fn test_map_backend_basic_operations() {
        let mut backend: MapBackend<String, i32> = MapBackend::with_capacity(4);

        backend.set("k1".to_string(), 1);
        backend.set("k2".to_string(), 2);

        assert_eq!(backend.get(&"k1".to_string()), Some(&1));
        assert_eq!(backend.get(&"k3".to_string()), None);
        assert_eq!(backend.len(), 2);

        backend.remove(&"k1".to_string());
        assert_eq!(backend.get(&"k1".to_string()), None);
        assert_eq!(backend.len(), 1);
    }

    /// Validates `MapBackend` behavior for the overwrite scenario.
    ///
    /// Assertions:
    /// - Confirms `set` on an existing key replaces the value without
    ///   growing the backend.
    #[test]
    fn test_map_backend_overwrite() {
        let mut backend: MapBackend<String, i32> = MapBackend::with_capacity(0);

        backend.set("k1".to_string(), 1);
        backend.set("k1".to_string(), 2);

        assert_eq!(backend.get(&"k1".to_string()), Some(&2));
        assert_eq!(backend.len(), 1);
    }

    /// Validates `MapBackend::remove_if` behavior for the predicate removal
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms matching entries are removed and the rest survive.
    #[test]
    fn test_map_backend_remove_if() {
        let mut backend: MapBackend<i32, i32> = MapBackend::with_capacity(0);

        for i in 1..=4 {
            backend.set(i, i * 10);
        }

        backend.remove_if(&mut |key, _| key % 2 == 0);

        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get(&1), Some(&10));
        assert_eq!(backend.get(&2), None);
        assert_eq!(backend.get(&3), Some(&30));
        assert_eq!(backend.get(&4), None);
    }

    /// Validates `MapBackend::purge` behavior for the purge scenario.
    ///
    /// Assertions:
    /// - Confirms `len` is 0 after purge and the backend is reusable.
    #[test]
    fn test_map_backend_purge() {
        let mut backend: MapBackend<i32, i32> = MapBackend::with_capacity(0);

        backend.set(1, 1);
        backend.set(2, 2);
        backend.purge();

        assert_eq!(backend.len(), 0);
        assert_eq!(backend.get(&1), None);

        backend.set(3, 3);
        assert_eq!(backend.get(&3), Some(&3));
    }

    /// Validates `MapBackend::capacity` behavior for the unbounded sentinel
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `capacity()` equals `None`.
    #[test]
    fn test_map_backend_is_unbounded() {
        let backend: MapBackend<i32, i32> = MapBackend::with_capacity(2);
        assert_eq!(backend.capacity(), None);
    }
}
