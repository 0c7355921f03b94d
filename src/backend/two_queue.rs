//! 2Q (two queue) cache.

use std::hash::Hash;

use super::{Backend, LruCache};

/// A fixed-size 2Q cache.
///
/// 2Q improves on plain LRU by tracking recently and frequently used entries
/// separately, so a burst of accesses to new keys cannot flush the
/// frequently used ones. A key seen once lands in the *recent* queue; seen
/// again, it is promoted to the *frequent* queue. Keys evicted from the
/// recent queue leave a keys-only *ghost* entry behind, and a key that comes
/// back while still in the ghost list goes straight to the frequent queue.
///
/// The recent and frequent queues together hold at most `capacity` entries;
/// the ghost list holds at most `capacity / 2` keys and stores no values.
///
/// Not thread-safe; wrap it in a lock for concurrent use.
#[derive(Debug)]
pub struct TwoQueueCache<K, V> {
    capacity: usize,
    /// Target size of the recent queue, `capacity / 2`.
    recent_target: usize,

    recent: LruCache<K, V>,
    frequent: LruCache<K, V>,
    ghost: LruCache<K, ()>,
}

impl<K, V> TwoQueueCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a 2Q cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent_target: capacity / 2,
            recent: LruCache::new(capacity),
            frequent: LruCache::new(capacity),
            ghost: LruCache::new(capacity / 2),
        }
    }

    /// Number of stored entries across the recent and frequent queues.
    pub fn len(&self) -> usize {
        self.recent.len() + self.frequent.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up `key`, promoting it from the recent to the frequent queue on
    /// a repeat access. The ghost list is not consulted.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.frequent.contains(key) {
            return self.frequent.get(key);
        }

        // A second access to a recent entry makes it frequent.
        if let Some(value) = self.recent.remove(key) {
            self.frequent.set(key.clone(), value);
            return self.frequent.peek(key);
        }

        None
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: K, value: V) {
        // Already frequent: update in place (touches recency).
        if self.frequent.contains(&key) {
            self.frequent.set(key, value);
            return;
        }

        // Seen recently: promote to the frequent queue.
        if self.recent.contains(&key) {
            self.recent.remove(&key);
            self.frequent.set(key, value);
            return;
        }

        // Recently evicted: bring it back as frequent.
        if self.ghost.contains(&key) {
            self.ensure_space(true);
            self.ghost.remove(&key);
            self.frequent.set(key, value);
            return;
        }

        // Never seen: add to the recent queue.
        self.ensure_space(false);
        self.recent.set(key, value);
    }

    /// Make room for one entry if the cache is full.
    fn ensure_space(&mut self, recent_evict: bool) {
        let recent_len = self.recent.len();
        let frequent_len = self.frequent.len();
        if recent_len + frequent_len < self.capacity {
            return;
        }

        // Evict from the recent queue while it exceeds its target; the
        // evicted key is remembered in the ghost list. When the insertion
        // was triggered by a ghost hit, an exactly-at-target recent queue is
        // spared and the frequent queue pays instead.
        if recent_len > 0
            && (recent_len > self.recent_target
                || (recent_len == self.recent_target && !recent_evict))
        {
            if let Some((key, _)) = self.recent.remove_oldest() {
                self.ghost.set(key, ());
            }
            return;
        }

        self.frequent.remove_oldest();
    }

    /// Remove `key` from whichever queue holds it.
    pub fn remove(&mut self, key: &K) {
        if self.frequent.remove(key).is_some() {
            return;
        }
        if self.recent.remove(key).is_some() {
            return;
        }
        self.ghost.remove(key);
    }

    /// Remove every entry matching the predicate.
    ///
    /// The ghost list is not scanned: it holds no values, so the predicate
    /// is not defined for it.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) {
        self.frequent.remove_if(&mut predicate);
        self.recent.remove_if(&mut predicate);
    }

    /// Remove all entries, including the ghost list.
    pub fn purge(&mut self) {
        self.frequent.purge();
        self.recent.purge();
        self.ghost.purge();
    }
}

impl<K, V> Backend<K, V> for TwoQueueCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        TwoQueueCache::get(self, key)
    }

    fn set(&mut self, key: K, value: V) {
        TwoQueueCache::set(self, key, value);
    }

    fn remove(&mut self, key: &K) {
        TwoQueueCache::remove(self, key);
    }

    fn remove_if(&mut self, predicate: &mut dyn FnMut(&K, &V) -> bool) {
        TwoQueueCache::remove_if(self, predicate);
    }

    fn purge(&mut self) {
        TwoQueueCache::purge(self);
    }

    fn len(&self) -> usize {
        TwoQueueCache::len(self)
    }

    fn capacity(&self) -> Option<usize> {
        Some(TwoQueueCache::capacity(self))
    }
}
