//! Background sweep of expired records.
//!
//! The cleaner is a single task that periodically asks the cache core to
//! drop records older than `ttl`, reclaiming memory that lazy removal on
//! read would only free for keys that are read again.
//!
//! It must not keep the cache alive: the task holds a [`Weak`] handle and
//! exits when the upgrade fails. The stop channel covers the gap between
//! ticks — its sender lives in the core, so dropping the last cache handle
//! closes the channel and wakes the task immediately instead of one
//! interval later. A cached value that (transitively) holds a cache handle
//! would form a reference cycle and defeat both mechanisms; storing the
//! cache inside itself is the caller's bug, not something the cleaner can
//! repair.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::core::CacheInner;
use crate::clock::Clock;

/// Launch the sweep task for `inner` and wire its stop signal into the
/// core.
pub(crate) fn spawn<K, V, E, C>(inner: &Arc<CacheInner<K, V, E, C>>, every: Duration)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = Arc::downgrade(inner);
    tokio::spawn(run(handle, every, stop_rx));
    inner.install_cleaner_stop(stop_tx);
}

async fn run<K, V, E, C>(
    handle: Weak<CacheInner<K, V, E, C>>,
    every: Duration,
    mut stop: oneshot::Receiver<()>,
) where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    // First sweep one full interval after construction; skip ticks missed
    // under load instead of bursting to catch up.
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match handle.upgrade() {
                    Some(cache) => cache.remove_expired(),
                    None => return,
                }
            }
            _ = &mut stop => return,
        }
    }
}
