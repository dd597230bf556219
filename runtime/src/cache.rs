//! Reference cache: TTL-bounded shop/station/area snapshots.
//!
//! Readers get an `Arc<CatalogSnapshot>` and keep a self-consistent view for as
//! long as they hold it. A refresh fetches and indexes the whole catalog off to
//! one side, then replaces the shared pointer in one write. Refreshes are
//! serialized by a gate so the background timer, stale readers and the
//! operator hook never fetch twice for the same staleness.

use crate::catalog::CatalogSnapshot;
use crate::metrics::CatalogMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shiftmatch_core::environment::Clock;
use shiftmatch_core::error::CatalogError;
use shiftmatch_core::store::CatalogSource;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};

/// Reference cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum snapshot age before a read triggers a rebuild; also the
    /// background refresh interval.
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Outcome of a successful refresh, reported by the operator hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Active shops in the new snapshot
    pub active_shops: usize,
    /// Stations with at least one active shop
    pub stations: usize,
    /// Areas with at least one station
    pub areas: usize,
    /// Build time of the new snapshot
    pub built_at: DateTime<Utc>,
}

/// Shared, refreshable catalog snapshot.
pub struct ReferenceCache {
    source: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    current: RwLock<Arc<CatalogSnapshot>>,
    refresh_gate: Mutex<()>,
}

impl ReferenceCache {
    /// Create a cache holding the empty snapshot. Nothing is fetched until the
    /// first read or refresh.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            source,
            clock,
            settings,
            current: RwLock::new(Arc::new(CatalogSnapshot::empty())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Current snapshot, rebuilding first if none exists or it is older than the TTL.
    ///
    /// Never fails: if the rebuild fails the previous snapshot (possibly the
    /// empty one) is returned and the failure is logged.
    pub async fn get(&self) -> Arc<CatalogSnapshot> {
        let snapshot = self.peek();
        if !self.is_stale(&snapshot) {
            return snapshot;
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while we waited.
        let snapshot = self.peek();
        if !self.is_stale(&snapshot) {
            return snapshot;
        }
        match self.rebuild().await {
            Ok(_) => self.peek(),
            Err(e) => {
                tracing::warn!(error = %e, "Catalog rebuild on read failed, serving previous snapshot");
                snapshot
            }
        }
    }

    /// Current snapshot without any staleness check.
    #[must_use]
    pub fn peek(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Fetch the catalog, rebuild every index and swap the snapshot.
    ///
    /// Safe to call concurrently with readers and other refreshes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the source cannot be read; the previous
    /// snapshot stays active.
    pub async fn refresh(&self) -> Result<RefreshSummary, CatalogError> {
        let _gate = self.refresh_gate.lock().await;
        self.rebuild().await
    }

    async fn rebuild(&self) -> Result<RefreshSummary, CatalogError> {
        let started = Instant::now();
        let raw = match self.source.fetch_all().await {
            Ok(raw) => raw,
            Err(e) => {
                CatalogMetrics::record_failure();
                return Err(e);
            }
        };

        let built_at = self.clock.now();
        let snapshot = CatalogSnapshot::build(&raw, built_at);
        let summary = RefreshSummary {
            active_shops: snapshot.active_shop_count(),
            stations: snapshot.stations().len(),
            areas: snapshot.areas().len(),
            built_at,
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        CatalogMetrics::record_refresh(summary.active_shops, started.elapsed());
        tracing::info!(
            active_shops = summary.active_shops,
            stations = summary.stations,
            areas = summary.areas,
            "Reference catalog refreshed"
        );
        Ok(summary)
    }

    fn is_stale(&self, snapshot: &CatalogSnapshot) -> bool {
        let Some(built_at) = snapshot.built_at() else {
            return true;
        };
        let age = self.clock.now().signed_duration_since(built_at);
        age.to_std().is_ok_and(|age| age > self.settings.ttl)
    }

    /// Refresh unconditionally every TTL until shutdown is signalled.
    ///
    /// The first refresh happens immediately.
    pub async fn run_refresher(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.ttl);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Scheduled catalog refresh failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Catalog refresher stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use shiftmatch_core::catalog::{RawCatalog, RawShopRow, RawStationLink};
    use shiftmatch_testing::{ManualClock, StaticCatalog};

    fn shop(id: &str, name: &str, station: &str) -> RawShopRow {
        RawShopRow {
            row_number: 1,
            id: Some(id.into()),
            name: name.into(),
            is_active: None,
            stations: vec![RawStationLink {
                station: station.into(),
                distance: Some("100".into()),
            }],
        }
    }

    fn catalog(rows: Vec<RawShopRow>) -> RawCatalog {
        RawCatalog {
            shops: rows,
            station_areas: vec![],
        }
    }

    fn cache(source: &Arc<StaticCatalog>, clock: &Arc<ManualClock>) -> ReferenceCache {
        ReferenceCache::new(
            Arc::clone(source) as Arc<dyn CatalogSource>,
            Arc::clone(clock) as Arc<dyn Clock>,
            CacheSettings {
                ttl: Duration::from_secs(900),
            },
        )
    }

    #[tokio::test]
    async fn first_read_builds_and_fresh_reads_do_not_refetch() {
        let source = Arc::new(StaticCatalog::new(catalog(vec![shop("1", "Alpha", "Арбатская")])));
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&source, &clock);

        assert_eq!(cache.get().await.active_shop_count(), 1);
        clock.advance(chrono::Duration::minutes(10));
        cache.get().await;
        assert_eq!(source.fetch_count(), 1);

        clock.advance(chrono::Duration::minutes(6));
        cache.get().await;
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_snapshot() {
        let source = Arc::new(StaticCatalog::new(catalog(vec![shop("1", "Alpha", "Арбатская")])));
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&source, &clock);
        let before = cache.get().await;

        source.set_failing(true);
        assert!(cache.refresh().await.is_err());
        clock.advance(chrono::Duration::hours(1));
        let after = cache.get().await;

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.station_shops("Арбатская").len(), 1);
    }

    #[tokio::test]
    async fn read_with_unreachable_source_returns_empty_snapshot() {
        let source = Arc::new(StaticCatalog::new(RawCatalog::default()));
        source.set_failing(true);
        let cache = cache(&source, &Arc::new(ManualClock::default()));

        let snapshot = cache.get().await;
        assert!(snapshot.built_at().is_none());
        assert_eq!(snapshot.active_shop_count(), 0);
    }

    #[tokio::test]
    async fn removed_station_disappears_after_refresh() {
        let source = Arc::new(StaticCatalog::new(catalog(vec![
            shop("1", "Alpha", "Х"),
            shop("2", "Beta", "Арбатская"),
        ])));
        let cache = cache(&source, &Arc::new(ManualClock::default()));
        assert!(cache.get().await.station("Х").is_some());

        source.set(catalog(vec![shop("2", "Beta", "Арбатская")]));
        let summary = cache.refresh().await.unwrap();
        assert_eq!(summary.stations, 1);

        let snapshot = cache.get().await;
        assert!(snapshot.station("Х").is_none());
        assert!(snapshot.station_shops("Х").is_empty());
        assert_eq!(snapshot.station_shops("Арбатская")[0].shop_name, "Beta");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stale_readers_share_one_rebuild() {
        let source = Arc::new(StaticCatalog::new(catalog(vec![shop("1", "Alpha", "Арбатская")])));
        source.set_delay(Duration::from_millis(20));
        let cache = Arc::new(cache(&source, &Arc::new(ManualClock::default())));

        let readers = (0..8).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await.active_shop_count() })
        });
        for count in futures::future::join_all(readers).await {
            assert_eq!(count.unwrap(), 1);
        }
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn refresher_stops_on_shutdown() {
        let source = Arc::new(StaticCatalog::new(catalog(vec![])));
        let cache = Arc::new(cache(&source, &Arc::new(ManualClock::default())));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::clone(&cache).run_refresher(rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(source.fetch_count(), 1);
    }
}
