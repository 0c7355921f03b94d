//! Cache metrics.

use std::fmt;

/// Hit/miss counters kept under the cache mutex.
///
/// Plain integers on purpose: every increment happens while the lock that
/// made the corresponding state change visible is still held, so readers
/// always see counters consistent with the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub(crate) hits: u64,
    pub(crate) grace_hits: u64,
    pub(crate) misses: u64,
    pub(crate) replacements: u64,
}

/// A snapshot of cache metrics.
///
/// Useful for monitoring performance and tuning the cache size and backend.
///
/// The hit ratio counts both fresh and stale (grace) hits as hits:
/// `(hits + grace_hits) / (hits + grace_hits + misses)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of fresh cache hits in `get` or `get_if_exists`.
    pub hits: u64,
    /// Number of stale cache hits in `get` or `get_if_exists`.
    pub grace_hits: u64,
    /// Number of cache misses in `get` or `get_if_exists`.
    pub misses: u64,
    /// Number of times the loader has returned.
    ///
    /// Incremented after the loader finishes, to keep it off the hot lock
    /// paths; a snapshot taken while a load is in flight does not count it.
    pub replacements: u64,
    /// Number of records currently stored in the backend.
    pub size: usize,
    /// Backend capacity; `None` when unbounded.
    pub capacity: Option<usize>,
}

impl Stats {
    /// The cache hit ratio, or 0 when nothing has been requested yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.grace_hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.hits + self.grace_hits) as f64 / total as f64
    }

    pub(crate) fn snapshot(counters: Counters, size: usize, capacity: Option<usize>) -> Self {
        Self {
            hits: counters.hits,
            grace_hits: counters.grace_hits,
            misses: counters.misses,
            replacements: counters.replacements,
            size,
            capacity,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -1 is the conventional sentinel for an unbounded backend.
        let capacity = self.capacity.map_or(-1, |c| c as i64);
        write!(
            f,
            "Hits: {}, GraceHits: {}, Misses: {}, Replacements: {}, Hit Ratio: {:.6}, Size: {}, Capacity: {}",
            self.hits,
            self.grace_hits,
            self.misses,
            self.replacements,
            self.hit_ratio(),
            self.size,
            capacity,
        )
    }
}
