//! # Shiftmatch Core
//!
//! Core types and traits for the shift marketplace engine.
//!
//! Directors post open shifts, workers post availability, and counterparties
//! claim each other's postings up to a fixed capacity. This crate holds the
//! vocabulary shared by every other crate in the workspace; it performs no I/O.
//!
//! ## Core Concepts
//!
//! - **Request**: a posted shift (or availability) with a bounded set of claimants
//! - **Claim**: a counterparty taking one slot of a request
//! - **Reference catalog**: shops, transit stations and areas used for matching
//! - **Side effect**: a description of a notification or posting change, executed
//!   by a separate worker after durable state has been written
//! - **Collaborators**: the durable store, the catalog source, the notifier and the
//!   public poster, all injected as trait objects
//!
//! ## Example
//!
//! ```
//! use shiftmatch_core::types::{Capacity, RequestStatus};
//!
//! let capacity = Capacity::clamped(12);
//! assert_eq!(capacity.value(), 5);
//! assert!(RequestStatus::Expired.is_closed());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Domain types: requests, shift windows, identities, catalog records.
pub mod types;

/// Typed error enums for every operation of the engine.
pub mod error;

/// Reference catalog raw rows and derived records.
pub mod catalog;

/// Durable store and catalog source contracts.
pub mod store;

/// Outbound notification and public posting contracts.
pub mod ports;

/// Side effect commands emitted by the engine.
pub mod effect;

/// Environment module - injected time source.
///
/// All time-dependent decisions (shift validation, expiry, cache age) read the
/// clock through this trait so tests can pin or advance time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftmatch_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
