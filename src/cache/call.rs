//! The in-flight call record shared by a load's leader and its waiters.

use std::sync::OnceLock;

use tokio::sync::watch;

use super::entry::Entry;

/// An in-flight or completed value replacement for a single key.
///
/// The leader writes the result slot exactly once and then releases the
/// latch; waiters read the slot only after the latch has been released. A
/// released latch with an empty slot means the leading task was cancelled
/// before the loader finished, and waiters must re-enter the state machine.
#[derive(Debug)]
pub(crate) struct Call<V, E> {
    done: watch::Sender<bool>,
    result: OnceLock<Result<Entry<V>, E>>,
}

impl<V, E> Call<V, E> {
    pub(crate) fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self { done, result: OnceLock::new() }
    }

    /// Record the outcome. Must happen at most once, before [`release`].
    ///
    /// [`release`]: Call::release
    pub(crate) fn set_result(&self, result: Result<Entry<V>, E>) {
        let _ = self.result.set(result);
    }

    /// The outcome, if the call has one.
    pub(crate) fn result(&self) -> Option<&Result<Entry<V>, E>> {
        self.result.get()
    }

    /// Release the latch, waking every waiter.
    pub(crate) fn release(&self) {
        self.done.send_replace(true);
    }

    /// Wait until the latch is released.
    ///
    /// Returns immediately when the call already completed; late
    /// subscribers observe the terminal value.
    pub(crate) async fn wait(&self) {
        let mut done = self.done.subscribe();
        loop {
            if *done.borrow_and_update() {
                return;
            }
            if done.changed().await.is_err() {
                return;
            }
        }
    }
}
