//! Shared harness for runtime integration tests.

#![allow(dead_code)] // Not every test file uses every helper
#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use chrono::{DateTime, Utc};
use shiftmatch_core::catalog::{RawCatalog, RawShopRow, RawStationLink};
use shiftmatch_core::effect::SideEffect;
use shiftmatch_runtime::{Marketplace, MarketplaceConfig};
use shiftmatch_testing::{InMemoryRequestStore, ManualClock, StaticCatalog};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a test needs to drive the engine and observe it.
pub struct TestEnv {
    pub store: Arc<InMemoryRequestStore>,
    pub catalog: Arc<StaticCatalog>,
    pub clock: Arc<ManualClock>,
    pub market: Marketplace,
    pub effects: mpsc::UnboundedReceiver<SideEffect>,
}

impl TestEnv {
    /// Effects emitted so far, in order.
    pub fn drain_effects(&mut self) -> Vec<SideEffect> {
        let mut out = Vec::new();
        while let Ok(effect) = self.effects.try_recv() {
            out.push(effect);
        }
        out
    }
}

/// Marketplace over an in-memory store with shops 10 (active) and 11 (inactive).
pub fn test_env() -> TestEnv {
    test_env_with(MarketplaceConfig::default())
}

pub fn test_env_with(config: MarketplaceConfig) -> TestEnv {
    let store = Arc::new(InMemoryRequestStore::new());
    let catalog = Arc::new(StaticCatalog::new(sample_catalog()));
    let clock = Arc::new(ManualClock::default());
    let (market, pending) = Marketplace::new(store.clone(), catalog.clone(), clock.clone(), config);
    TestEnv {
        store,
        catalog,
        clock,
        market,
        effects: pending.into_receiver(),
    }
}

pub fn shop(id: &str, name: &str, active: &str, station: &str) -> RawShopRow {
    RawShopRow {
        row_number: 1,
        id: Some(id.into()),
        name: name.into(),
        is_active: Some(active.into()),
        stations: vec![RawStationLink {
            station: station.into(),
            distance: Some("250".into()),
        }],
    }
}

pub fn sample_catalog() -> RawCatalog {
    RawCatalog {
        shops: vec![
            shop("10", "Alpha", "1", "Тверская"),
            shop("11", "Beta", "0", "Тверская"),
        ],
        station_areas: Vec::new(),
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}
