//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod admin;
pub mod catalog;
pub mod health;
pub mod requests;

// Re-export common handler utilities
pub use health::health_check;
