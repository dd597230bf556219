//! HTTP API tests against in-memory collaborators.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};
use shiftmatch_core::catalog::{RawCatalog, RawShopRow, RawStationLink};
use shiftmatch_core::types::{RequestId, RequestStatus, UserId};
use shiftmatch_runtime::{Marketplace, MarketplaceConfig};
use shiftmatch_testing::builders::RequestBuilder;
use shiftmatch_testing::{InMemoryRequestStore, ManualClock, StaticCatalog};
use shiftmatch_web::{AppState, build_router};
use std::sync::Arc;

const ADMIN_TOKEN: &str = "s3cret";

struct Harness {
    server: TestServer,
    store: Arc<InMemoryRequestStore>,
    catalog: Arc<StaticCatalog>,
}

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

fn harness_with_token(admin_token: Option<&str>) -> Harness {
    let store = Arc::new(InMemoryRequestStore::new());
    let catalog = Arc::new(StaticCatalog::new(catalog()));
    let clock = Arc::new(ManualClock::default());
    let (market, _pending) = Marketplace::new(
        store.clone(),
        catalog.clone(),
        clock.clone(),
        MarketplaceConfig::default(),
    );
    let state = AppState::new(&market, clock, admin_token.map(str::to_string));
    let server = TestServer::new(build_router(state)).expect("Failed to start test server");
    Harness { server, store, catalog }
}

fn harness() -> Harness {
    harness_with_token(Some(ADMIN_TOKEN))
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
}

fn draft_body() -> Value {
    json!({
        "kind": "director",
        "date": "2025-01-02",
        "start": "09:00:00",
        "end": "17:00:00",
        "shop_id": 10,
        "station": null,
        "position": "Barista",
        "note": null,
        "author_id": 1000
    })
}

#[tokio::test]
async fn test_health_endpoints() {
    let h = harness();
    h.server.get("/health").await.assert_status_ok();

    let ready = h.server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["status"], "ready");

    h.store.set_unavailable(true);
    h.server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_submit_then_claim_then_read() {
    let h = harness();

    let created = h.server.post("/api/requests").json(&draft_body()).await;
    created.assert_status(StatusCode::CREATED);
    let id = created.json::<Value>()["id"].as_i64().unwrap();

    let claimed = h
        .server
        .post(&format!("/api/requests/{id}/claim"))
        .json(&json!({ "claimant_id": 7 }))
        .await;
    claimed.assert_status_ok();
    let outcome = claimed.json::<Value>();
    assert_eq!(outcome["status"], "open");
    assert_eq!(outcome["filled_slots"], 1);
    assert_eq!(outcome["capacity"], 5);

    let read = h.server.get(&format!("/api/requests/{id}")).await;
    read.assert_status_ok();
    let body = read.json::<Value>();
    assert_eq!(body["shop_name"], "Alpha");
    assert_eq!(body["claimant_ids"], json!([7]));
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let h = harness();

    let mut off_grid = draft_body();
    off_grid["start"] = json!("10:07:00");
    off_grid["end"] = json!("10:22:00");
    let response = h.server.post("/api/requests").json(&off_grid).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "INVALID_SHIFT_WINDOW");

    let mut unknown_shop = draft_body();
    unknown_shop["shop_id"] = json!(99);
    let response = h.server.post("/api/requests").json(&unknown_shop).await;
    assert_eq!(response.json::<Value>()["code"], "UNKNOWN_SHOP");

    assert_eq!(h.store.append_count(), 0);
}

#[tokio::test]
async fn test_claim_rejections_map_to_statuses() {
    let h = harness();
    h.store.insert(RequestBuilder::director(1).capacity(1).claimants(&[5]).build());
    h.store.insert(RequestBuilder::director(2).status(RequestStatus::Expired).build());

    let full = h.server.post("/api/requests/1/claim").json(&json!({ "claimant_id": 7 })).await;
    full.assert_status(StatusCode::CONFLICT);
    assert_eq!(full.json::<Value>()["code"], "FULL");

    let own = h.server.post("/api/requests/1/claim").json(&json!({ "claimant_id": 1000 })).await;
    assert_eq!(own.json::<Value>()["code"], "SELF_CLAIM");

    h.server
        .post("/api/requests/2/claim")
        .json(&json!({ "claimant_id": 7 }))
        .await
        .assert_status(StatusCode::GONE);

    h.server
        .post("/api/requests/3/claim")
        .json(&json!({ "claimant_id": 7 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_by_author_only() {
    let h = harness();
    h.store.insert(RequestBuilder::worker(1).build());

    h.server
        .post("/api/requests/1/cancel")
        .json(&json!({ "actor_id": 7 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    h.server
        .post("/api/requests/1/cancel")
        .json(&json!({ "actor_id": 1000 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(h.store.get(RequestId::new(1)).unwrap().status, RequestStatus::Cancelled);
}

#[tokio::test]
async fn test_register_user() {
    let h = harness();
    h.server
        .put("/api/users/7")
        .json(&json!({ "role": "worker", "username": "anna", "first_name": "Anna" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let stored = h.store.get_user(UserId::new(7)).unwrap();
    assert_eq!(stored.contact_line(), "Anna @anna");
}

#[tokio::test]
async fn test_catalog_menus() {
    let h = harness();

    let areas = h.server.get("/api/catalog/areas").await.json::<Value>();
    assert_eq!(areas[0]["area_id"], "CENTER");
    assert_eq!(areas[0]["shop_count"], 1);

    let found = h
        .server
        .get("/api/catalog/stations")
        .add_query_param("q", "твер")
        .await
        .json::<Value>();
    assert_eq!(found[0]["name"], "Тверская");

    let shops = h.server.get("/api/catalog/stations/Тверская/shops").await;
    shops.assert_status_ok();
    assert_eq!(shops.json::<Value>()[0]["shop_name"], "Alpha");

    h.server
        .get("/api/catalog/stations/Nowhere/shops")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_hooks_require_token() {
    let h = harness();

    h.server
        .post("/admin/sweep")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("wrong");
    h.server
        .post("/admin/sweep")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer(ADMIN_TOKEN);
    let report = h.server.post("/admin/sweep").add_header(name, value).await;
    report.assert_status_ok();
    assert_eq!(report.json::<Value>()["expired"], 0);

    let (name, value) = bearer(ADMIN_TOKEN);
    let refreshed = h.server.post("/admin/catalog/refresh").add_header(name, value).await;
    refreshed.assert_status_ok();
    assert_eq!(refreshed.json::<Value>()["active_shops"], 1);
}

#[tokio::test]
async fn test_admin_rejects_token_of_matching_length() {
    let h = harness();

    for guess in ["s3creT", "xxxxxx", "s3cre"] {
        let (name, value) = bearer(guess);
        h.server
            .post("/admin/sweep")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_admin_refresh_failure_keeps_serving() {
    let h = harness();
    h.server.get("/api/catalog/areas").await.assert_status_ok();
    h.catalog.set_failing(true);

    let (name, value) = bearer(ADMIN_TOKEN);
    h.server
        .post("/admin/catalog/refresh")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let areas = h.server.get("/api/catalog/areas").await.json::<Value>();
    assert_eq!(areas.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_hooks_disabled_without_token() {
    let h = harness_with_token(Some("   "));
    let (name, value) = bearer("anything");
    h.server
        .post("/admin/sweep")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
