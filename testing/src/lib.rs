//! # Shiftmatch Testing
//!
//! Testing utilities for the shift marketplace engine.
//!
//! This crate provides:
//! - Controllable clocks (`FixedClock`, `ManualClock`)
//! - In-memory collaborators: request store, catalog source, notifier, poster
//! - Builders for requests and drafts
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use shiftmatch_testing::{InMemoryRequestStore, RecordingNotifier, builders::RequestBuilder};
//!
//! #[tokio::test]
//! async fn claim_fills_request() {
//!     let store = Arc::new(InMemoryRequestStore::new());
//!     store.insert(RequestBuilder::director(1).capacity(1).build());
//!
//!     let outcome = engine.claim(RequestId::new(1), UserId::new(7), None).await.unwrap();
//!     assert_eq!(outcome.status, RequestStatus::Filled);
//! }
//! ```

use chrono::{DateTime, Utc};
use shiftmatch_core::environment::Clock;

/// In-memory request store
pub mod store;

/// In-memory catalog source
pub mod catalog;

/// Recording notifier and poster
pub mod ports;

/// Request and draft builders
pub mod builders;

/// Mock clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use shiftmatch_testing::mocks::FixedClock;
    /// use shiftmatch_core::environment::Clock;
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
    /// Starts at [`test_time`] unless created with [`ManualClock::new`].
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Clock stopped at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time: Mutex::new(time) }
        }

        /// Move the clock forward (or back, for a negative duration).
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(test_time())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Reference instant for tests: 2025-01-01 00:00:00 UTC (03:00 in Moscow).
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// Claim attempts as claimant ids drawn from a small pool, so duplicates
    /// and the author (id 1000) show up regularly.
    pub fn claim_attempts() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(prop_oneof![9 => 1_i64..12, 1 => Just(1000_i64)], 0..24)
    }

    /// Capacities as stored, including out-of-range values that get clamped.
    pub fn raw_capacity() -> impl Strategy<Value = i64> {
        -2_i64..9
    }
}

pub use catalog::StaticCatalog;
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};
pub use ports::{PostCall, RecordingNotifier, RecordingPoster};
pub use store::InMemoryRequestStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::default();
        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(clock.now(), test_time() + chrono::Duration::minutes(90));
    }
}
