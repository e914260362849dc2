//! # Gymbook Testing
//!
//! Testing utilities and helpers for the gym booking engine.
//!
//! This crate provides:
//! - Clocks: [`FixedClock`] and the adjustable [`MockClock`]
//! - [`InMemoryBookingStore`]: a versioned store with conflict injection
//! - [`fixtures`]: ready-made gyms, classes, tiers and members
//!
//! ## Example
//!
//! ```
//! use gymbook_testing::{InMemoryBookingStore, fixtures, test_clock};
//!
//! let store = InMemoryBookingStore::new();
//! store.seed_member(fixtures::member("alice", 5));
//! let clock = test_clock();
//! ```

use chrono::{DateTime, Utc};
use gymbook_core::Clock;

pub mod fixtures;
mod memory_store;

pub use memory_store::InMemoryBookingStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gymbook_testing::mocks::FixedClock;
    /// use gymbook_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep a handle while the
    /// service under test owns another.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MockClock {
        /// Create a clock starting at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut current) = self.time.lock() {
                *current = time;
            }
        }

        /// Move forward by `by`.
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut current) = self.time.lock() {
                *current += by;
            }
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(crate::fixtures::epoch())
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, MockClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_mock_clock_advances_all_clones() {
        let clock = MockClock::new(fixtures::epoch());
        let handle = clock.clone();

        handle.advance(chrono::Duration::minutes(90));

        assert_eq!(clock.now(), fixtures::epoch() + chrono::Duration::minutes(90));
    }
}
