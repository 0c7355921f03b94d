//! The cache core: the freshness state machine and request coalescing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::backend::Backend;
use crate::cache::call::Call;
use crate::cache::cleaner;
use crate::cache::config::{CacheBuilder, ConfigError};
use crate::cache::entry::Entry;
use crate::cache::stats::{Counters, Stats};
use crate::clock::{Clock, SystemClock};
use crate::loader::Loader;

/// An in-memory read-through cache with request coalescing.
///
/// Values are retrieved exclusively through [`get`]; there is deliberately
/// no `set`. The cache invokes the [`Loader`] at most once per in-flight
/// key, serves records within their freshness window without loading, and
/// with `ttl > fresh_for` serves stale records while a single background
/// task refreshes them.
///
/// `Cache` is a shared handle: clones refer to the same cache, and all
/// methods take `&self`. Background refreshes, [`notify`], and the cleaner
/// spawn onto the ambient Tokio runtime, so the cache must be built and
/// used inside one.
///
/// [`get`]: Cache::get
/// [`notify`]: Cache::notify
///
/// # Type parameters
///
/// - `K`: key type.
/// - `V`: value type; cloned out of the cache on every hit.
/// - `E`: the loader's error type; cloned to every coalesced waiter.
/// - `C`: clock, defaults to [`SystemClock`].
///
/// # Example
/// ```
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// use stampede::{loader_fn, Cache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = Cache::new(
///     loader_fn(|key: String| async move { Ok::<_, Infallible>(format!("value-{key}")) }),
///     Duration::from_secs(1),
///     Duration::from_secs(2),
/// )
/// .unwrap();
///
/// assert_eq!(cache.get(&"a".to_string()).await.unwrap(), "value-a");
/// # }
/// ```
pub struct Cache<K, V, E, C = SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    inner: Arc<CacheInner<K, V, E, C>>,
}

impl<K, V, E, C> std::fmt::Debug for Cache<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl<K, V, E, C> Clone for Cache<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache over `loader` with the default map backend.
    ///
    /// See [`CacheBuilder::new`] for the meaning of `fresh_for` and `ttl`;
    /// backend selection and the remaining options live on
    /// [`CacheBuilder`].
    pub fn new(
        loader: impl Loader<K, V, E>,
        fresh_for: Duration,
        ttl: Duration,
    ) -> Result<Self, ConfigError> {
        CacheBuilder::new(fresh_for, ttl).build(loader)
    }
}

impl<K, V, E, C> Cache<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    pub(crate) fn assemble(
        config: CacheBuilder,
        backend: Box<dyn Backend<K, Entry<V>> + Send>,
        loader: Arc<dyn Loader<K, V, E>>,
        clock: C,
    ) -> Self {
        let inner = Arc::new(CacheInner {
            state: Mutex::new(State {
                values: backend,
                calls: HashMap::new(),
                counters: Counters::default(),
            }),
            loader,
            fresh_for: config.fresh_for,
            ttl: config.ttl,
            strict_coalescing: config.strict_coalescing,
            clock,
            cleaner_stop: Mutex::new(None),
        });

        if let Some(interval) = config.cleanup_interval {
            cleaner::spawn(&inner, interval);
        }

        Self { inner }
    }

    /// Retrieve the value for `key`, loading it if necessary.
    ///
    /// May return a stale value (older than `fresh_for` but younger than
    /// `ttl`) while a fresh one is being fetched in the background.
    /// Concurrent requests for the same key are coalesced into a single
    /// loader invocation, whose error (if any) is handed to every waiting
    /// caller verbatim; errors are never cached.
    ///
    /// Cancelling (dropping) a `get` future that is running the loader
    /// cancels that load; waiters coalesced onto it recover by starting a
    /// new one.
    pub async fn get(&self, key: &K) -> Result<V, E> {
        // Record time before acquiring the lock - this maximizes the reuse
        // of values.
        let called_at = self.inner.clock.now();
        let mut found = {
            let mut state = self.inner.state();
            state.values.get(key).cloned()
        };

        // Whether the next step is to wait on an in-flight call or to run
        // the loader ourselves. Kept out of the locked block below so the
        // `MutexGuard` never overlaps an `.await` point (it must not, for
        // the returned future to stay `Send`).
        enum NextStep<V, E> {
            Wait(Arc<Call<V, E>>),
            Run(Arc<Call<V, E>>),
        }

        loop {
            if let Some(entry) = &found {
                // Value exists and is fresh - just return.
                if entry.is_fresh(called_at, self.inner.fresh_for) {
                    let mut state = self.inner.state();
                    state.counters.hits += 1;
                    return Ok(entry.value.clone());
                }

                // Value exists and is stale - serve it while updating in
                // the background. The refresh runs detached so cancelling
                // this caller cannot poison it.
                if !entry.is_expired(called_at, self.inner.ttl) {
                    let mut state = self.inner.state();
                    if !state.calls.contains_key(key) {
                        let call = Arc::new(Call::new());
                        state.calls.insert(key.clone(), Arc::clone(&call));
                        CacheInner::spawn_refresh(&self.inner, key.clone(), call);
                    }
                    state.counters.grace_hits += 1;
                    return Ok(entry.value.clone());
                }
            }

            // Value doesn't exist or is expired - a fresh load is needed.
            let next = {
                let mut state = self.inner.state();
                state.counters.misses += 1;
                let existing = state.calls.get(key).cloned();
                match existing {
                    Some(call) => NextStep::Wait(call),
                    None => {
                        let call = Arc::new(Call::new());
                        state.calls.insert(key.clone(), Arc::clone(&call));
                        NextStep::Run(call)
                    }
                }
            };

            match next {
                NextStep::Wait(call) => {
                    call.wait().await;
                    match call.result() {
                        Some(Ok(entry)) if self.inner.strict_coalescing => {
                            // Strict coalescing: re-classify the shared
                            // result against our own arrival time, so a
                            // request never accepts a value that was stale
                            // when it arrived.
                            found = Some(entry.clone());
                            continue;
                        }
                        Some(Ok(entry)) => return Ok(entry.value.clone()),
                        Some(Err(err)) => return Err(err.clone()),
                        None => {
                            // The leading call was cancelled before the
                            // loader finished; start over.
                            let mut state = self.inner.state();
                            found = state.values.get(key).cloned();
                            continue;
                        }
                    }
                }
                NextStep::Run(call) => {
                    return CacheInner::run_call(Arc::clone(&self.inner), key.clone(), call).await;
                }
            }
        }
    }

    /// Retrieve the value for `key` without ever triggering a load.
    ///
    /// Stale values count as present, expired ones as absent. Never waits,
    /// even when a load for `key` is in flight.
    pub fn get_if_exists(&self, key: &K) -> Option<V> {
        let called_at = self.inner.clock.now();
        let mut state = self.inner.state();
        let found = state.values.get(key).cloned();

        match found {
            Some(entry) if !entry.is_expired(called_at, self.inner.ttl) => {
                if entry.is_fresh(called_at, self.inner.fresh_for) {
                    state.counters.hits += 1;
                } else {
                    state.counters.grace_hits += 1;
                }
                Some(entry.value)
            }
            _ => {
                state.counters.misses += 1;
                None
            }
        }
    }

    /// Hint the cache to load the value for `key` in the background if it
    /// is not fresh. Returns immediately.
    pub fn notify(&self, key: &K) {
        let called_at = self.inner.clock.now();
        let mut state = self.inner.state();

        if let Some(entry) = state.values.get(key) {
            if entry.is_fresh(called_at, self.inner.fresh_for) {
                return;
            }
        }

        if !state.calls.contains_key(key) {
            let call = Arc::new(Call::new());
            state.calls.insert(key.clone(), Arc::clone(&call));
            CacheInner::spawn_refresh(&self.inner, key.clone(), call);
        }
    }

    /// Forget the value for `key`.
    ///
    /// The stored record is dropped, an in-flight load (if any) is detached
    /// so its result will not be written to the cache, and the next `get`
    /// immediately retrieves a new value.
    pub fn forget(&self, key: &K) {
        let mut state = self.inner.state();
        state.calls.remove(key);
        state.values.remove(key);
    }

    /// [`forget`](Cache::forget) every key matching the predicate.
    pub fn forget_if(&self, predicate: impl Fn(&K) -> bool) {
        let mut state = self.inner.state();
        state.calls.retain(|key, _| !predicate(key));
        state.values.remove_if(&mut |key, _| predicate(key));
    }

    /// [`forget`](Cache::forget) every key.
    ///
    /// Frequent purges hurt the hit ratio; prefer [`forget`](Cache::forget)
    /// or [`forget_if`](Cache::forget_if) for single keys.
    pub fn purge(&self) {
        let mut state = self.inner.state();
        state.calls.clear();
        state.values.purge();
    }

    /// A snapshot of the cache metrics.
    pub fn stats(&self) -> Stats {
        let state = self.inner.state();
        Stats::snapshot(state.counters, state.values.len(), state.values.capacity())
    }
}

/// Shared cache state behind the handle.
///
/// Background refreshes hold a strong reference for the duration of one
/// load; the cleaner holds only a weak one, so it never extends the cache's
/// lifetime.
pub(crate) struct CacheInner<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    state: Mutex<State<K, V, E>>,
    loader: Arc<dyn Loader<K, V, E>>,
    fresh_for: Duration,
    ttl: Duration,
    strict_coalescing: bool,
    clock: C,
    /// Dropping this sender (with the last `CacheInner`) cancels the
    /// cleaner immediately.
    cleaner_stop: Mutex<Option<oneshot::Sender<()>>>,
}

struct State<K, V, E> {
    values: Box<dyn Backend<K, Entry<V>> + Send>,
    calls: HashMap<K, Arc<Call<V, E>>>,
    counters: Counters,
}

impl<K, V, E, C> CacheInner<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Lock the state, recovering from poisoning: a caller panicking with
    /// the lock held must not take the cache down with it.
    fn state(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn install_cleaner_stop(&self, stop: oneshot::Sender<()>) {
        let mut slot = self.cleaner_stop.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(stop);
    }

    /// Run the loader for `key` in a detached task, off the caller's
    /// context, and write the result through `call`.
    fn spawn_refresh(inner: &Arc<Self>, key: K, call: Arc<Call<V, E>>) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            if Self::run_call(inner, key, call).await.is_err() {
                // Nobody may be waiting on a background refresh; make the
                // swallowed failure visible.
                debug!("background cache refresh failed");
            }
        });
    }

    /// Invoke the loader for `key` and publish the outcome through `call`.
    ///
    /// Runs outside the lock. The result is written to the backend only if
    /// the in-flight table still maps `key` to this very call: `forget` and
    /// `purge` detach calls to keep discarded loads from writing through.
    async fn run_call(inner: Arc<Self>, key: K, call: Arc<Call<V, E>>) -> Result<V, E> {
        let mut guard = AbandonGuard {
            inner: Arc::clone(&inner),
            key: key.clone(),
            call: Arc::clone(&call),
            armed: true,
        };

        // Record time just before the loader runs, never after it returns;
        // a late stamp would let expired values pass as fresh.
        let created = inner.clock.now();
        let result = inner.loader.load(&key).await;
        guard.armed = false;
        drop(guard);

        let outcome: Result<Entry<V>, E> = result.map(|value| Entry::new(value, created));
        let output = match &outcome {
            Ok(entry) => Ok(entry.value.clone()),
            Err(err) => Err(err.clone()),
        };
        let stored = outcome.as_ref().ok().cloned();

        // Write once, before the latch fires; waiters read only after.
        call.set_result(outcome);

        {
            let mut state = inner.state();
            state.counters.replacements += 1;
            let still_ours =
                state.calls.get(&key).is_some_and(|current| Arc::ptr_eq(current, &call));
            if still_ours {
                if let Some(entry) = stored {
                    state.values.set(key.clone(), entry);
                }
                // This removal has to stay inside the still-ours check: a
                // newer call may already occupy the slot.
                state.calls.remove(&key);
            }
        }

        call.release();
        output
    }

    /// Drop expired records. Called by the cleaner.
    pub(crate) fn remove_expired(&self) {
        let mut state = self.state();
        // Record time after acquiring the lock to maximize how much is
        // swept.
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = state.values.len();
        state.values.remove_if(&mut |_, entry: &Entry<V>| entry.is_expired(now, ttl));
        let swept = before - state.values.len();
        if swept > 0 {
            tracing::trace!(swept, "removed expired cache records");
        }
    }
}

/// Keeps coalesced waiters from hanging when the task leading a load is
/// cancelled mid-flight: detaches the call and releases its latch with no
/// result, which sends waiters back into the state machine.
struct AbandonGuard<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    inner: Arc<CacheInner<K, V, E, C>>,
    key: K,
    call: Arc<Call<V, E>>,
    armed: bool,
}

impl<K, V, E, C> Drop for AbandonGuard<K, V, E, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.inner.state();
            let still_ours =
                state.calls.get(&self.key).is_some_and(|current| Arc::ptr_eq(current, &self.call));
            if still_ours {
                state.calls.remove(&self.key);
            }
        }
        self.call.release();
    }
}
