//! The timestamped record stored for each key.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value paired with the instant its load began.
///
/// A record is in one of three states, always computed and never stored:
///
/// 1. *fresh* for the first `fresh_for` after creation,
/// 2. *stale* when neither fresh nor expired,
/// 3. *expired* once `ttl` has passed.
///
/// `created` is captured immediately before the loader runs, never after it
/// returns; a late stamp would let expired values pass as fresh.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) created: Instant,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: V, created: Instant) -> Self {
        Self { value, created }
    }

    /// Whether the record is still within its freshness window at `now`.
    pub(crate) fn is_fresh(&self, now: Instant, fresh_for: Duration) -> bool {
        now < self.created + fresh_for
    }

    /// Whether the record has outlived `ttl` at `now`.
    pub(crate) fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.created + ttl < now
    }
}
