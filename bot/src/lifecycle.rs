//! Application lifecycle management and graceful shutdown.
//!
//! [`Application`] owns everything the server runs:
//!
//! 1. **Startup**: spawn the expiry sweeper, the catalog refresher and the
//!    side effect worker; warm the reference cache
//! 2. **Runtime**: serve the HTTP API and the Prometheus scrape endpoint
//! 3. **Shutdown**: stop accepting connections, stop the sweeper and refresher,
//!    then let the side effect worker drain, each with a bounded timeout
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::build(Config::from_env()).await?;
//! app.run().await?;
//! ```

use crate::config::Config;
use crate::telegram::TelegramClient;
use anyhow::Context;
use axum::{Router, routing::get};
use shiftmatch_core::environment::{Clock, SystemClock};
use shiftmatch_core::ports::{Notifier, Poster};
use shiftmatch_postgres::{PostgresCatalog, PostgresRequestStore};
use shiftmatch_runtime::metrics::MetricsServer;
use shiftmatch_runtime::{Marketplace, PendingWorker};
use shiftmatch_web::{AppState, build_router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Outbound ports handed to the side effect worker.
pub struct Ports {
    /// Private notices and operator alerts
    pub notifier: Arc<dyn Notifier>,
    /// Public channel postings
    pub poster: Arc<dyn Poster>,
}

/// Running application with all background tasks.
pub struct Application {
    listener: TcpListener,
    metrics_listener: Option<(TcpListener, MetricsServer)>,
    market: Marketplace,
    worker: PendingWorker,
    ports: Ports,
    router: Router,
    shutdown_timeout: Duration,
}

impl Application {
    /// Wire an application around already-built components.
    #[must_use]
    pub fn new(
        listener: TcpListener,
        market: Marketplace,
        worker: PendingWorker,
        ports: Ports,
        state: AppState,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            metrics_listener: None,
            market,
            worker,
            ports,
            router: build_router(state),
            shutdown_timeout,
        }
    }

    /// Serve Prometheus metrics from `server` on `listener`.
    #[must_use]
    pub fn with_metrics(mut self, listener: TcpListener, server: MetricsServer) -> Self {
        self.metrics_listener = Some((listener, server));
        self
    }

    /// Connect to `PostgreSQL`, run migrations and wire every component.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unreachable, migrations fail, the
    /// Telegram client cannot be built or a listener cannot bind.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let pool = shiftmatch_postgres::connect(&config.postgres.url, config.postgres.max_connections)
            .await
            .context("connecting to PostgreSQL")?;
        shiftmatch_postgres::run_migrations(&pool)
            .await
            .context("running migrations")?;
        info!("✓ Database ready");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (market, worker) = Marketplace::new(
            Arc::new(PostgresRequestStore::from_pool(pool.clone())),
            Arc::new(PostgresCatalog::from_pool(pool)),
            Arc::clone(&clock),
            config.marketplace_config(),
        );

        let telegram = Arc::new(TelegramClient::new(&config.telegram).context("building Telegram client")?);
        if !telegram.is_enabled() {
            warn!("BOT_TOKEN is empty; notices and postings will not be delivered");
        }
        let ports = Ports {
            notifier: telegram.clone(),
            poster: telegram,
        };

        let state = AppState::new(&market, clock, config.server.admin_token.clone());
        let listener = TcpListener::bind(config.server_addr())
            .await
            .with_context(|| format!("binding {}", config.server_addr()))?;

        let metrics_listener = TcpListener::bind(config.metrics_addr())
            .await
            .with_context(|| format!("binding {}", config.metrics_addr()))?;
        let mut metrics = MetricsServer::new(metrics_listener.local_addr()?);
        metrics.start()?;

        Ok(Self::new(
            listener,
            market,
            worker,
            ports,
            state,
            Duration::from_secs(config.server.shutdown_timeout),
        )
        .with_metrics(metrics_listener, metrics))
    }

    /// Address the HTTP API is bound to.
    ///
    /// # Errors
    ///
    /// Returns error if the listener has no local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run_until(self, signal: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        if let Err(e) = self.market.cache.refresh().await {
            warn!(error = %e, "Initial catalog load failed; serving an empty catalog until the next refresh");
        }

        let mut running = self
            .market
            .start(self.worker, self.ports.notifier, self.ports.poster);

        if let Some((listener, server)) = self.metrics_listener {
            if let Some(handle) = server.handle().cloned() {
                let router = Router::new().route(
                    "/metrics",
                    get(move || {
                        let handle = handle.clone();
                        async move { handle.render() }
                    }),
                );
                let mut metrics_shutdown = running.subscribe();
                info!(address = %server.addr(), "Serving Prometheus metrics");
                running.push(tokio::spawn(async move {
                    let stop = async move {
                        let _ = metrics_shutdown.wait_for(|stop| *stop).await;
                    };
                    if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
                        error!(error = %e, "Metrics server failed");
                    }
                }));
            }
        }
        info!(task_count = running.task_count(), "Background tasks started");

        info!(address = ?self.listener.local_addr().ok(), "HTTP server listening for requests");
        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped, initiating graceful shutdown...");
        running.shutdown(self.shutdown_timeout).await;
        info!("Graceful shutdown complete");

        served.context("HTTP server failed")
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
