//! Shift Marketplace Server
//!
//! This binary:
//! - Loads configuration from the environment (and `.env` if present)
//! - Connects to `PostgreSQL` and runs migrations
//! - Starts the expiry sweeper, catalog refresher and side effect worker
//! - Serves the HTTP API and Prometheus metrics until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... BOT_TOKEN=... CHANNEL_ID=... cargo run --bin shiftmatch
//! ```

use shiftmatch_bot::{Application, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shiftmatch=debug,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🛒 Starting shift marketplace server...");

    let config = Config::from_env();
    tracing::info!(
        address = %config.server_addr(),
        metrics = %config.metrics_addr(),
        channel = config.telegram.channel_id,
        "Configuration loaded"
    );

    let app = Application::build(config).await?;
    tracing::info!("✓ Application initialized");

    app.run().await
}
