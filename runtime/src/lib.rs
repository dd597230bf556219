//! # Shiftmatch Runtime
//!
//! The concurrent request-matching and lifecycle engine.
//!
//! ## Core Components
//!
//! - **`LockRegistry`**: one lock per request id, shared by claims, expiry and cancellation
//! - **`MatchingEngine`**: submission, the claim state machine, author cancellation
//! - **`ExpirySweeper`**: background transition of ended shifts to `expired`
//! - **`ReferenceCache`**: TTL-refreshed shop/station/area snapshots swapped atomically
//! - **`EffectWorker`**: executes notifications and posting changes after state is durable
//!
//! ## Example
//!
//! ```ignore
//! use shiftmatch_runtime::{Marketplace, MarketplaceConfig};
//!
//! let (market, worker) = Marketplace::new(store, catalog, clock, MarketplaceConfig::default());
//! let running = market.start(worker, notifier, poster);
//!
//! let id = market.engine.submit(draft).await?;
//! market.engine.claim(id, worker_id, None).await?;
//!
//! running.shutdown(Duration::from_secs(10)).await;
//! ```

use shiftmatch_core::effect::SideEffect;
use shiftmatch_core::environment::Clock;
use shiftmatch_core::ports::{Notifier, Poster};
use shiftmatch_core::store::{CatalogSource, RequestStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Per-request locks
pub mod lock_registry;

/// Submission, claims and cancellation
pub mod engine;

/// Background expiry
pub mod sweeper;

/// Catalog snapshot and index builder
pub mod catalog;

/// TTL-bounded reference cache
pub mod cache;

/// Side effect queue and worker
pub mod effects;

/// Post and notice text
pub mod render;

/// Prometheus metrics for observability
pub mod metrics;

pub use cache::{CacheSettings, RefreshSummary, ReferenceCache};
pub use catalog::CatalogSnapshot;
pub use effects::{EffectSender, EffectWorker};
pub use engine::{ClaimOutcome, EngineSettings, MatchingEngine};
pub use lock_registry::LockRegistry;
pub use sweeper::{ExpirySweeper, SweepReport};

/// Settings for every component of a [`Marketplace`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketplaceConfig {
    /// Engine settings
    pub engine: EngineSettings,
    /// Cache settings
    pub cache: CacheSettings,
    /// Sweeper tick; defaults to one minute
    pub sweep_interval: Option<Duration>,
}

/// The engine and its background components, wired to shared collaborators.
#[derive(Clone)]
pub struct Marketplace {
    /// Claim state machine
    pub engine: Arc<MatchingEngine>,
    /// Reference catalog
    pub cache: Arc<ReferenceCache>,
    /// Expiry sweeper
    pub sweeper: Arc<ExpirySweeper>,
}

/// Side effect receiver not yet attached to its ports.
pub struct PendingWorker {
    rx: mpsc::UnboundedReceiver<SideEffect>,
    store: Arc<dyn RequestStore>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
}

impl PendingWorker {
    /// Build the worker with its ports and spawn it.
    pub fn spawn(
        self,
        notifier: Arc<dyn Notifier>,
        poster: Arc<dyn Poster>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let worker = EffectWorker::new(notifier, poster, self.store, self.locks, self.clock);
        tokio::spawn(worker.run(self.rx, shutdown))
    }

    /// Raw receiver, for tests asserting on emitted effects.
    #[must_use]
    pub fn into_receiver(self) -> mpsc::UnboundedReceiver<SideEffect> {
        self.rx
    }
}

impl Marketplace {
    /// Wire components around one store, one lock registry and one clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        config: MarketplaceConfig,
    ) -> (Self, PendingWorker) {
        let locks = Arc::new(LockRegistry::new());
        let (effects, rx) = EffectSender::channel();
        let cache = Arc::new(ReferenceCache::new(catalog, Arc::clone(&clock), config.cache));
        let engine = Arc::new(MatchingEngine::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&locks),
            Arc::clone(&clock),
            effects,
            config.engine,
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::clone(&engine),
            config.sweep_interval.unwrap_or(Duration::from_secs(60)),
        ));

        let pending = PendingWorker {
            rx,
            store,
            locks,
            clock,
        };
        (
            Self {
                engine,
                cache,
                sweeper,
            },
            pending,
        )
    }

    /// Spawn the sweeper, the catalog refresher and the side effect worker.
    ///
    /// The worker listens on its own shutdown channel so that it outlives the
    /// tasks feeding it; see [`RunningMarketplace::shutdown`].
    #[must_use]
    pub fn start(
        &self,
        worker: PendingWorker,
        notifier: Arc<dyn Notifier>,
        poster: Arc<dyn Poster>,
    ) -> RunningMarketplace {
        let (background_tx, background_rx) = watch::channel(false);
        let (worker_tx, worker_rx) = watch::channel(false);
        RunningMarketplace {
            background: vec![
                tokio::spawn(Arc::clone(&self.sweeper).run(background_rx.clone())),
                tokio::spawn(Arc::clone(&self.cache).run_refresher(background_rx)),
            ],
            background_tx,
            worker: worker.spawn(notifier, poster, worker_rx),
            worker_tx,
        }
    }
}

/// Background tasks of a started [`Marketplace`].
pub struct RunningMarketplace {
    background_tx: watch::Sender<bool>,
    background: Vec<JoinHandle<()>>,
    worker_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl RunningMarketplace {
    /// Shutdown signal of the first stage, for extra tasks (such as a metrics
    /// listener) that should stop alongside the sweeper.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.background_tx.subscribe()
    }

    /// Track an extra task stopped by [`Self::subscribe`]'s signal.
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.background.push(handle);
    }

    /// Number of tracked tasks, the worker included.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.background.len() + 1
    }

    /// Stop in two stages: first the sweeper, refresher and extra tasks, then
    /// the side effect worker once nothing can queue effects any more. Each
    /// task gets `timeout` to finish.
    pub async fn shutdown(self, timeout: Duration) {
        let _ = self.background_tx.send(true);
        for (idx, handle) in self.background.into_iter().enumerate() {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => tracing::info!(task = idx, "Background task stopped gracefully"),
                Ok(Err(e)) => tracing::warn!(task = idx, error = %e, "Background task failed"),
                Err(_) => tracing::warn!(task = idx, "Background task shutdown timed out"),
            }
        }

        let _ = self.worker_tx.send(true);
        match tokio::time::timeout(timeout, self.worker).await {
            Ok(Ok(())) => tracing::info!("Side effect worker drained"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Side effect worker failed"),
            Err(_) => tracing::warn!("Side effect worker shutdown timed out"),
        }
    }
}
