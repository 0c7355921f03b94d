//! Least-recently-used cache.

use std::collections::HashMap;
use std::hash::Hash;

use super::Backend;

/// Sentinel index for "no node".
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// A fixed-capacity LRU cache.
///
/// Entries are kept in most-recently-used to least-recently-used order in a
/// doubly linked list threaded through a slot arena, with a map from key to
/// slot index. `get` and `set` move the touched entry to the front; when the
/// capacity is exceeded the back entry is evicted.
///
/// Not thread-safe; wrap it in a lock for concurrent use.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Most recently used node, or `NIL` when empty.
    head: usize,
    /// Least recently used node, or `NIL` when empty.
    tail: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an LRU cache holding at most `capacity` entries.
    ///
    /// A capacity of 0 keeps the cache permanently empty.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Look up `key` without updating recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Whether `key` is present. Does not update recency.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or overwrite `key`, marking it most recently used.
    ///
    /// Evicts the least recently used entry when the capacity is exceeded.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = self.slots[idx].as_mut() {
                node.value = value;
            }
            self.move_to_front(idx);
            return;
        }

        let idx = self.allocate(Node { key: key.clone(), value, prev: NIL, next: NIL });
        self.push_front(idx);
        self.map.insert(key, idx);
        if self.map.len() > self.capacity {
            self.remove_oldest();
        }
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.remove_index(idx)
    }

    /// Remove and return the least recently used entry.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let key = self.slots[idx].as_ref()?.key.clone();
        self.map.remove(&key);
        let value = self.remove_index(idx)?;
        Some((key, value))
    }

    /// Remove every entry matching the predicate.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) {
        let mut doomed = Vec::new();
        for (key, &idx) in &self.map {
            if let Some(node) = self.slots[idx].as_ref() {
                if predicate(key, &node.value) {
                    doomed.push(key.clone());
                }
            }
        }
        for key in doomed {
            self.remove(&key);
        }
    }

    /// Remove all entries.
    pub fn purge(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn allocate(&mut self, node: Node<K, V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn remove_index(&mut self, idx: usize) -> Option<V> {
        self.unlink(idx);
        self.free.push(idx);
        self.slots[idx].take().map(|node| node.value)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        if prev == NIL {
            self.head = next;
        } else if let Some(node) = self.slots[prev].as_mut() {
            node.next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else if let Some(node) = self.slots[next].as_mut() {
            node.prev = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            if let Some(node) = self.slots[old_head].as_mut() {
                node.prev = idx;
            }
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }
}

impl<K, V> Backend<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        LruCache::get(self, key)
    }

    fn set(&mut self, key: K, value: V) {
        LruCache::set(self, key, value);
    }

    fn remove(&mut self, key: &K) {
        LruCache::remove(self, key);
    }

    fn remove_if(&mut self, predicate: &mut dyn FnMut(&K, &V) -> bool) {
        LruCache::remove_if(self, predicate);
    }

    fn purge(&mut self) {
        LruCache::purge(self);
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn capacity(&self) -> Option<usize> {
        Some(LruCache::capacity(self))
    }
}
