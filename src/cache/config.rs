//! Cache construction and configuration.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::backend::{Backend, LruCache, MapBackend, TwoQueueCache};
use crate::cache::core::Cache;
use crate::cache::entry::Entry;
use crate::clock::{Clock, SystemClock};
use crate::loader::Loader;

/// Which backend stores the cached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendConfig {
    Map { initial_capacity: usize },
    Lru { capacity: usize },
    TwoQueue { capacity: usize },
}

/// A rejected cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `fresh_for` must not exceed `ttl`.
    #[error("fresh_for ({fresh_for:?}) cannot be longer than ttl ({ttl:?})")]
    FreshForLongerThanTtl {
        /// The configured freshness window.
        fresh_for: Duration,
        /// The configured expiry threshold.
        ttl: Duration,
    },

    /// Evicting backends need room for at least one entry.
    #[error("{backend} backend requires a capacity greater than 0")]
    ZeroCapacity {
        /// Name of the offending backend.
        backend: &'static str,
    },

    /// A cleaner that never ticks is a misconfiguration, not a no-op.
    #[error("cleanup interval must be greater than 0")]
    ZeroCleanupInterval,
}

/// Fluent configuration for a [`Cache`].
///
/// The map backend is the default; note that it never evicts, so if the key
/// cardinality is high consider [`lru_backend`] or [`two_queue_backend`].
///
/// [`lru_backend`]: CacheBuilder::lru_backend
/// [`two_queue_backend`]: CacheBuilder::two_queue_backend
///
/// # Example
/// ```
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// use stampede::{loader_fn, CacheBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = CacheBuilder::new(Duration::from_secs(1), Duration::from_secs(5))
///     .lru_backend(1024)
///     .strict_coalescing()
///     .build(loader_fn(|key: u64| async move { Ok::<_, Infallible>(key * 2) }))
///     .unwrap();
///
/// assert_eq!(cache.get(&21).await.unwrap(), 42);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    pub(crate) fresh_for: Duration,
    pub(crate) ttl: Duration,
    pub(crate) backend: BackendConfig,
    pub(crate) strict_coalescing: bool,
    pub(crate) cleanup_interval: Option<Duration>,
}

impl CacheBuilder {
    /// Start configuring a cache with the given freshness window and expiry
    /// threshold.
    ///
    /// Records are served without any loading for `fresh_for` after
    /// creation. With `ttl` longer than `fresh_for`, a stale record is
    /// served from `get` while a single background task refreshes it
    /// (graceful replacement).
    pub fn new(fresh_for: Duration, ttl: Duration) -> Self {
        Self {
            fresh_for,
            ttl,
            backend: BackendConfig::Map { initial_capacity: 0 },
            strict_coalescing: false,
            cleanup_interval: None,
        }
    }

    /// Store records in a plain hash map, the default.
    ///
    /// The map backend never evicts; records stay until they expire and the
    /// cleaner (if any) sweeps them, or they are forgotten explicitly.
    pub fn map_backend(mut self, initial_capacity: usize) -> Self {
        self.backend = BackendConfig::Map { initial_capacity };
        self
    }

    /// Store records in an LRU cache holding at most `capacity` entries.
    ///
    /// Capacity must be greater than 0.
    pub fn lru_backend(mut self, capacity: usize) -> Self {
        self.backend = BackendConfig::Lru { capacity };
        self
    }

    /// Store records in a 2Q cache holding at most `capacity` entries.
    ///
    /// Capacity must be greater than 0.
    pub fn two_queue_backend(mut self, capacity: usize) -> Self {
        self.backend = BackendConfig::TwoQueue { capacity };
        self
    }

    /// Never hand a waiter a load result that was already stale when the
    /// waiter arrived; such waiters re-enter the cache and trigger a new
    /// load instead.
    ///
    /// With zero `fresh_for` and `ttl` this degenerates to a "zero-time
    /// cache": a load is shared only by requests that arrived while it was
    /// running. Only useful when the freshness window is very short or
    /// loads are very slow, and every response must be fresh; most users do
    /// not need it.
    pub fn strict_coalescing(mut self) -> Self {
        self.strict_coalescing = true;
        self
    }

    /// Sweep expired records from the backend every `interval`.
    ///
    /// Without a cleaner, expired records are only dropped lazily when read
    /// (or evicted). The sweep task holds a non-owning handle: it stops as
    /// soon as the last cache handle is dropped. Must be greater than 0.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Build the cache with the system clock.
    ///
    /// Fails if `fresh_for` exceeds `ttl`, an evicting backend has zero
    /// capacity, or the cleanup interval is zero.
    pub fn build<K, V, E, L>(self, loader: L) -> Result<Cache<K, V, E>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        L: Loader<K, V, E>,
    {
        self.build_with_clock(loader, SystemClock)
    }

    /// Build the cache with a custom clock (useful for testing).
    pub fn build_with_clock<K, V, E, L, C>(
        self,
        loader: L,
        clock: C,
    ) -> Result<Cache<K, V, E, C>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        L: Loader<K, V, E>,
        C: Clock,
    {
        let backend = self.validate_backend::<K, V>()?;
        if self.fresh_for > self.ttl {
            return Err(ConfigError::FreshForLongerThanTtl {
                fresh_for: self.fresh_for,
                ttl: self.ttl,
            });
        }
        if self.cleanup_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::ZeroCleanupInterval);
        }

        Ok(Cache::assemble(self, backend, Arc::new(loader), clock))
    }

    /// Build the cache, panicking on a configuration error.
    ///
    /// # Panics
    ///
    /// Panics where [`build`] would return an error.
    ///
    /// [`build`]: CacheBuilder::build
    pub fn build_or_panic<K, V, E, L>(self, loader: L) -> Cache<K, V, E>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        L: Loader<K, V, E>,
    {
        match self.build(loader) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {err}"),
        }
    }

    fn validate_backend<K, V>(&self) -> Result<Box<dyn Backend<K, Entry<V>> + Send>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.backend {
            BackendConfig::Map { initial_capacity } => {
                Ok(Box::new(MapBackend::with_capacity(initial_capacity)))
            }
            BackendConfig::Lru { capacity } => {
                if capacity == 0 {
                    return Err(ConfigError::ZeroCapacity { backend: "LRU" });
                }
                Ok(Box::new(LruCache::new(capacity)))
            }
            BackendConfig::TwoQueue { capacity } => {
                if capacity == 0 {
                    return Err(ConfigError::ZeroCapacity { backend: "2Q" });
                }
                Ok(Box::new(TwoQueueCache::new(capacity)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache configuration.
    use std::convert::Infallible;

    use super::*;
    use crate::loader::loader_fn;

    fn noop_loader() -> impl Loader<String, String, Infallible> {
        loader_fn(|_key: String| async move { Ok(String::new()) })
    }

    /// Validates `CacheBuilder::build` behavior for the valid-default
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures building with equal zero durations succeeds.
    #[tokio::test]
    async fn test_build_defaults() {
        let built = CacheBuilder::new(Duration::ZERO, Duration::ZERO).build(noop_loader());
        assert!(built.is_ok());
    }

    /// Validates `CacheBuilder::build` behavior for the inverted-durations
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `fresh_for > ttl` is rejected with the matching error.
    #[tokio::test]
    async fn test_build_rejects_fresh_for_longer_than_ttl() {
        let err = CacheBuilder::new(Duration::from_secs(120), Duration::from_secs(60))
            .build(noop_loader())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::FreshForLongerThanTtl {
                fresh_for: Duration::from_secs(120),
                ttl: Duration::from_secs(60),
            },
        );
    }

    /// Validates `CacheBuilder::lru_backend` behavior for the zero-capacity
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms LRU and 2Q reject capacity 0, with or without strict
    ///   coalescing.
    /// - Ensures the map backend accepts any initial capacity.
    #[tokio::test]
    async fn test_build_rejects_zero_capacity() {
        let err = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .lru_backend(0)
            .build(noop_loader())
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity { backend: "LRU" });

        let err = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .two_queue_backend(0)
            .strict_coalescing()
            .build(noop_loader())
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity { backend: "2Q" });

        assert!(CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .map_backend(0)
            .build(noop_loader())
            .is_ok());
    }

    /// Validates `CacheBuilder::cleanup_interval` behavior for the
    /// zero-interval scenario.
    ///
    /// Assertions:
    /// - Confirms a zero cleanup interval is rejected.
    #[tokio::test]
    async fn test_build_rejects_zero_cleanup_interval() {
        let err = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .cleanup_interval(Duration::ZERO)
            .build(noop_loader())
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCleanupInterval);
    }

    /// Validates `CacheBuilder::build_or_panic` behavior for the error
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms an invalid configuration panics.
    #[tokio::test]
    #[should_panic(expected = "invalid cache configuration")]
    async fn test_build_or_panic_panics_on_invalid_config() {
        let _ = CacheBuilder::new(Duration::from_secs(2), Duration::from_secs(1))
            .build_or_panic(noop_loader());
    }

    /// Validates backend selection is reflected in the built cache.
    ///
    /// Assertions:
    /// - Confirms each backend reports its expected capacity through
    ///   `stats`.
    #[tokio::test]
    async fn test_backend_selection() {
        let map = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .map_backend(16)
            .build(noop_loader())
            .unwrap();
        assert_eq!(map.stats().capacity, None);

        let lru = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .lru_backend(10)
            .build(noop_loader())
            .unwrap();
        assert_eq!(lru.stats().capacity, Some(10));

        let two_queue = CacheBuilder::new(Duration::ZERO, Duration::ZERO)
            .two_queue_backend(10)
            .build(noop_loader())
            .unwrap();
        assert_eq!(two_queue.stats().capacity, Some(10));
    }
}
