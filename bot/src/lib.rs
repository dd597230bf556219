//! # Shiftmatch Bot
//!
//! Server binary for the shift marketplace: environment configuration, the
//! Telegram Bot API adapter behind the notification and posting ports, and the
//! application lifecycle with graceful shutdown.

#![forbid(unsafe_code)]

/// Environment configuration
pub mod config;

/// Telegram Bot API adapter
pub mod telegram;

/// Startup, serving and graceful shutdown
pub mod lifecycle;

pub use config::Config;
pub use lifecycle::{Application, Ports};
pub use telegram::TelegramClient;
