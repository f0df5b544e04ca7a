//! Wall-clock abstraction for deterministic testing.
//!
//! Decouples session logic from system time. Placeholder timestamps and
//! echo-correlation windows depend on "now", so tests inject a virtual
//! clock instead of sleeping.

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
///
/// Production code uses [`SystemClock`]; tests use
/// [`test_utils::MockClock`] to control time explicitly.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time (UTC).
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clocks with explicit time control.
pub mod test_utils {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeDelta, Utc};

    use super::Clock;

    /// Clock that only moves when told to.
    ///
    /// Clones share the same underlying time, so a clock handed to a
    /// session can be advanced from the test body.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MockClock {
        /// Create a clock frozen at the given instant.
        pub fn at(now: DateTime<Utc>) -> Self {
            Self { now: Arc::new(Mutex::new(now)) }
        }

        /// Advance the clock by a delta (negative deltas move it back).
        pub fn advance(&self, delta: TimeDelta) {
            let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *now += delta;
        }

        /// Jump the clock to an absolute instant.
        pub fn set(&self, instant: DateTime<Utc>) {
            let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *now = instant;
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::at(DateTime::UNIX_EPOCH)
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }
}
