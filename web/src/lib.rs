//! Axum HTTP surface for the shift marketplace.
//!
//! The conversational front-end drives the engine through the intake routes
//! and reads the reference catalog for its menus; operators get two hooks to
//! force a catalog refresh or an expiry sweep.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract data** from the path and JSON body
//! 3. **Call the engine** (`submit`, `claim`, `cancel`) or read the catalog snapshot
//! 4. **Map the result** to a response; expected rejections become [`AppError`]s
//!    with a distinct status and code
//!
//! # Example
//!
//! ```ignore
//! use shiftmatch_web::{AppState, build_router};
//!
//! let state = AppState::new(&market, clock, config.admin_token.clone());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, build_router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
