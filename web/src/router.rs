//! Route table.

use crate::handlers::{admin, catalog, health, requests};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the full HTTP router.
///
/// # Routes
///
/// - `GET /health`, `GET /health/ready`
/// - `POST /api/requests`, `GET /api/requests/:id`
/// - `POST /api/requests/:id/claim`, `POST /api/requests/:id/cancel`
/// - `PUT /api/users/:id`
/// - `GET /api/catalog/areas`, `GET /api/catalog/areas/:area_id`
/// - `GET /api/catalog/stations`, `GET /api/catalog/stations/:name/shops`
/// - `POST /admin/catalog/refresh`, `POST /admin/sweep`
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        .route("/api/requests", post(requests::submit))
        .route("/api/requests/:id", get(requests::get_request))
        .route("/api/requests/:id/claim", post(requests::claim))
        .route("/api/requests/:id/cancel", post(requests::cancel))
        .route("/api/users/:id", put(requests::register_user))
        .route("/api/catalog/areas", get(catalog::areas))
        .route("/api/catalog/areas/:area_id", get(catalog::area))
        .route("/api/catalog/stations", get(catalog::search_stations))
        .route("/api/catalog/stations/:name/shops", get(catalog::station_shops))
        .route("/admin/catalog/refresh", post(admin::refresh_catalog))
        .route("/admin/sweep", post(admin::sweep))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
