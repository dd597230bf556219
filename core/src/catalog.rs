//! Reference catalog records.
//!
//! [`RawCatalog`] is what a [`crate::store::CatalogSource`] returns: loosely typed
//! rows exactly as they appear in the source table. The runtime parses them
//! into the derived records below and indexes them into a snapshot.

use crate::types::ShopId;
use serde::{Deserialize, Serialize};

/// Distance recorded for a shop/station pair whose distance is unknown.
pub const UNKNOWN_DISTANCE_M: u32 = 9999;

/// Number of station columns per shop row.
pub const MAX_STATIONS_PER_SHOP: usize = 3;

/// One station column pair of a shop row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStationLink {
    /// Station name; blank cells are ignored
    pub station: String,
    /// Distance text such as `"350"`, `"350 м"` or `"1,2"`
    pub distance: Option<String>,
}

/// A shop row as read from the catalog source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawShopRow {
    /// 1-based ordinal of the row among data rows; used when `id` is unusable
    pub row_number: usize,
    /// Shop id text
    pub id: Option<String>,
    /// Display name; rows with a blank name are skipped
    pub name: String,
    /// Active flag text; blank means active
    pub is_active: Option<String>,
    /// Up to [`MAX_STATIONS_PER_SHOP`] nearby stations
    pub stations: Vec<RawStationLink>,
}

/// A row of the station-to-area table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStationArea {
    /// Station name
    pub station: String,
    /// Area id such as `NORTH` or `MOSCOW_REGION`
    pub area_id: Option<String>,
    /// Optional display name overriding the preset
    pub area_name: Option<String>,
}

/// Everything a catalog refresh reads in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCatalog {
    /// Shop rows in source order
    pub shops: Vec<RawShopRow>,
    /// Station-to-area rows
    pub station_areas: Vec<RawStationArea>,
}

/// A station near a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopStation {
    /// Station name
    pub name: String,
    /// Walking distance in meters ([`UNKNOWN_DISTANCE_M`] when unknown)
    pub distance_m: u32,
}

/// A shop in the reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopRecord {
    /// Shop id
    pub id: ShopId,
    /// Display name
    pub name: String,
    /// Nearby stations (0 to 3)
    pub stations: Vec<ShopStation>,
    /// Inactive shops are kept in the shop index but never offered
    pub is_active: bool,
}

/// A shop as seen from one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopLocation {
    /// Shop id
    pub shop_id: ShopId,
    /// Shop display name
    pub shop_name: String,
    /// Distance from the station
    pub distance_m: u32,
}

/// A station with at least one active shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    /// Station name
    pub name: String,
    /// Owning area id
    pub area_id: String,
    /// Owning area display name
    pub area_name: String,
    /// Number of active shops reachable from this station
    pub shop_count: usize,
}

/// A geographic area grouping stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSummary {
    /// Area id
    pub area_id: String,
    /// Display name
    pub area_name: String,
    /// Preset emoji, empty when the area has no preset
    pub emoji: String,
    /// Menu title
    pub title: String,
    /// Distinct active shops across the area's stations
    pub shop_count: usize,
    /// Stations ordered by shop count descending, then name
    pub stations: Vec<StationSummary>,
}
