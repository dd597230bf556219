//! End-to-end lifecycle: serve, drive a claim through HTTP, shut down.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::{Value, json};
use shiftmatch_bot::{Application, Ports};
use shiftmatch_core::catalog::{RawCatalog, RawShopRow, RawStationLink};
use shiftmatch_core::types::{RequestId, UserId};
use shiftmatch_runtime::{Marketplace, MarketplaceConfig};
use shiftmatch_testing::{InMemoryRequestStore, ManualClock, PostCall, RecordingNotifier, RecordingPoster, StaticCatalog};
use shiftmatch_web::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn catalog() -> RawCatalog {
    RawCatalog {
        shops: vec![RawShopRow {
            row_number: 2,
            id: Some("10".into()),
            name: "Alpha".into(),
            is_active: Some("1".into()),
            stations: vec![RawStationLink {
                station: "Тверская".into(),
                distance: Some("300".into()),
            }],
        }],
        station_areas: Vec::new(),
    }
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_serves_until_signal_and_runs_effects() {
    let store = Arc::new(InMemoryRequestStore::new());
    let clock = Arc::new(ManualClock::default());
    let notifier = Arc::new(RecordingNotifier::new());
    let poster = Arc::new(RecordingPoster::new());
    let (market, worker) = Marketplace::new(
        store.clone(),
        Arc::new(StaticCatalog::new(catalog())),
        clock.clone(),
        MarketplaceConfig::default(),
    );

    let state = AppState::new(&market, clock, None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let app = Application::new(
        listener,
        market,
        worker,
        Ports {
            notifier: notifier.clone(),
            poster: poster.clone(),
        },
        state,
        Duration::from_secs(2),
    );
    let base = format!("http://{}", app.local_addr().unwrap());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(app.run_until(async move {
        let _ = stop_rx.await;
    }));

    let http = reqwest::Client::new();
    let created: Value = http
        .post(format!("{base}/api/requests"))
        .json(&json!({
            "kind": "director",
            "date": "2025-01-02",
            "start": "09:00:00",
            "end": "17:00:00",
            "shop_id": 10,
            "station": null,
            "position": "Barista",
            "note": null,
            "author_id": 1000
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let request_id = RequestId::new(id);
    assert!(
        eventually(|| store.get(request_id).and_then(|r| r.channel_post_ref).is_some()).await,
        "posting was never recorded"
    );
    assert_eq!(store.get(request_id).unwrap().channel_post_ref, poster.last_published());

    let claimed = http
        .post(format!("{base}/api/requests/{id}/claim"))
        .json(&json!({ "claimant_id": 7 }))
        .send()
        .await
        .unwrap();
    assert!(claimed.status().is_success());

    assert!(eventually(|| !notifier.messages_for(UserId::new(7)).is_empty()).await, "claimant was never notified");
    assert!(
        eventually(|| poster.calls().iter().any(|call| matches!(call, PostCall::Update { .. }))).await,
        "posting was never updated"
    );

    stop_tx.send(()).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(10), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}
