//! Read-only catalog endpoints backing the area, station and shop menus.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shiftmatch_core::catalog::{AreaSummary, ShopLocation, StationSummary};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 50;

/// Areas in menu order.
///
/// ```text
/// GET /api/catalog/areas
/// ```
pub async fn areas(State(state): State<AppState>) -> Json<Vec<AreaSummary>> {
    Json(state.cache.get().await.areas().to_vec())
}

/// One area with its stations.
///
/// ```text
/// GET /api/catalog/areas/:area_id
/// ```
///
/// # Errors
///
/// 404 if the area has no active shops.
pub async fn area(State(state): State<AppState>, Path(area_id): Path<String>) -> Result<Json<AreaSummary>, AppError> {
    let snapshot = state.cache.get().await;
    snapshot
        .area(&area_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found("Area", area_id))
}

/// Query of the station search.
#[derive(Debug, Deserialize)]
pub struct StationSearch {
    /// Free text typed by the user
    pub q: String,
    /// Maximum results
    pub limit: Option<usize>,
}

/// Stations matching free text.
///
/// ```text
/// GET /api/catalog/stations?q=...&limit=...
/// ```
pub async fn search_stations(
    State(state): State<AppState>,
    Query(search): Query<StationSearch>,
) -> Json<Vec<StationSummary>> {
    let limit = search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);
    let snapshot = state.cache.get().await;
    Json(snapshot.search_stations(&search.q, limit).into_iter().cloned().collect())
}

/// Active shops near a station, nearest first.
///
/// ```text
/// GET /api/catalog/stations/:name/shops
/// ```
///
/// # Errors
///
/// 404 if the station has no active shops.
pub async fn station_shops(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ShopLocation>>, AppError> {
    let snapshot = state.cache.get().await;
    let shops = snapshot.station_shops(&name);
    if shops.is_empty() {
        return Err(AppError::not_found("Station", name));
    }
    Ok(Json(shops.to_vec()))
}
