//! Monotonic time source with a mock implementation for tests.
//!
//! The cache only ever compares instants and adds durations to them, so the
//! trait exposes a single monotonic reading. Production code uses
//! [`SystemClock`]; tests inject [`MockClock`] to step time deterministically
//! without sleeping.
//!
//! Instants are [`tokio::time::Instant`] so that tests running under a paused
//! Tokio runtime (`tokio::time::pause`) see the same virtual time in the
//! freshness arithmetic as in the timers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Trait for monotonic time readings.
///
/// Implementations must be monotonically non-decreasing across calls within
/// a process.
pub trait Clock: Send + Sync + 'static {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Real monotonic clock for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing.
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing.
///
/// Starts at the instant it was created and only moves when [`advance`] is
/// called. Clones share the same underlying offset.
///
/// [`advance`]: MockClock::advance
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant.
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method).
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the duration the clock has been advanced by so far.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the clock module.
    use super::*;

    /// Validates `SystemClock::now` behavior for the monotonicity scenario.
    ///
    /// Assertions:
    /// - Ensures `b >= a` evaluates to true.
    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    /// Validates `MockClock::advance` behavior for the advance scenario.
    ///
    /// Assertions:
    /// - Confirms `clock.now()` equals `start + 15ms` after two advances.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance(Duration::from_millis(10));
        clock.advance_millis(5);

        assert_eq!(clock.now(), start + Duration::from_millis(15));
        assert_eq!(clock.elapsed(), Duration::from_millis(15));
    }

    /// Validates `MockClock::clone` behavior for the shared offset scenario.
    ///
    /// Assertions:
    /// - Confirms both clones observe the same instant after one advances.
    #[test]
    fn test_mock_clock_clones_share_offset() {
        let clock = MockClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_secs(1));

        assert_eq!(clock.now(), other.now());
    }
}
