//! Application state shared by every handler.

use shiftmatch_core::environment::Clock;
use shiftmatch_runtime::{ExpirySweeper, Marketplace, MatchingEngine, ReferenceCache};
use std::sync::Arc;

/// Handles to the engine and its background components.
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Submission, claims and cancellation
    pub engine: Arc<MatchingEngine>,
    /// Reference catalog
    pub cache: Arc<ReferenceCache>,
    /// Expiry sweeper, for the operator hook
    pub sweeper: Arc<ExpirySweeper>,
    /// Time source for profile timestamps
    pub clock: Arc<dyn Clock>,
    /// Bearer token for operator hooks; `None` disables them
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Build the state from a wired marketplace.
    ///
    /// A blank `admin_token` disables the operator hooks.
    #[must_use]
    pub fn new(market: &Marketplace, clock: Arc<dyn Clock>, admin_token: Option<String>) -> Self {
        Self {
            engine: Arc::clone(&market.engine),
            cache: Arc::clone(&market.cache),
            sweeper: Arc::clone(&market.sweeper),
            clock,
            admin_token: admin_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(Arc::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<AppState>();
    }
}
