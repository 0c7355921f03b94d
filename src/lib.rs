//! An in-memory, thread-safe, read-through cache with request coalescing.
//!
//! `stampede` wraps a user-supplied [`Loader`] and serves every read
//! through [`Cache::get`]. It guards the loader against cache stampedes:
//! concurrent requests for the same key are coalesced into a single
//! invocation whose result is shared by all of them. Two durations control
//! freshness — values younger than `fresh_for` are served directly; values
//! older than `fresh_for` but younger than `ttl` are served stale while one
//! background task fetches a replacement (graceful replacement); values
//! older than `ttl` force a synchronous load.
//!
//! There is deliberately no `set`: cache replacement is delegated entirely
//! to the loader, which the cache invokes at most once per in-flight key.
//! Loader errors are returned to every caller that was waiting on the
//! failed invocation and are never cached.
//!
//! # Backends
//!
//! Records live in one of three backends, chosen at construction: an
//! unbounded map (the default), an LRU, or a [2Q](TwoQueueCache) cache.
//! An optional periodic cleaner sweeps expired records to reclaim memory.
//!
//! # Example
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use stampede::{loader_fn, CacheBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = CacheBuilder::new(Duration::from_secs(1), Duration::from_secs(5))
//!     .lru_backend(128)
//!     .build(loader_fn(|key: String| async move {
//!         // Imagine a database query or an HTTP request here.
//!         Ok::<_, Infallible>(format!("value-{key}"))
//!     }))
//!     .unwrap();
//!
//! // First call loads; the second is served from the cache.
//! assert_eq!(cache.get(&"a".to_string()).await.unwrap(), "value-a");
//! assert_eq!(cache.get(&"a".to_string()).await.unwrap(), "value-a");
//! assert_eq!(cache.stats().replacements, 1);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod backend;
pub mod cache;
pub mod clock;
pub mod loader;

pub use backend::{LruCache, TwoQueueCache};
pub use cache::{Cache, CacheBuilder, ConfigError, Stats};
pub use clock::{Clock, MockClock, SystemClock};
pub use loader::{loader_fn, Loader, LoaderFn};
