//! `PostgreSQL` collaborators for the shift marketplace.
//!
//! This crate provides the production implementations of the storage
//! contracts from `shiftmatch-core`:
//!
//! - [`PostgresRequestStore`]: requests and user profiles
//! - [`PostgresCatalog`]: the raw shop and station-area tables
//!
//! Both use runtime-checked `sqlx` queries over a shared [`PgPool`]. The store
//! performs no locking of its own; the engine serializes writers per request.
//!
//! # Example
//!
//! ```ignore
//! use shiftmatch_postgres::{PostgresCatalog, PostgresRequestStore, connect, run_migrations};
//!
//! let pool = connect("postgres://localhost/shiftmatch", 10).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresRequestStore::from_pool(pool.clone());
//! let catalog = PostgresCatalog::from_pool(pool);
//! ```

#![forbid(unsafe_code)]

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Request and user tables
pub mod request_store;

/// Shop and station-area tables
pub mod catalog;

pub use catalog::PostgresCatalog;
pub use request_store::PostgresRequestStore;

/// Open a connection pool.
///
/// # Errors
///
/// Returns the driver error if the database cannot be reached.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Apply pending migrations from `migrations/`.
///
/// Applied versions are tracked in `_sqlx_migrations`, so a rerun only
/// applies new files.
///
/// # Errors
///
/// Returns error if a migration fails or an applied one was edited.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}
