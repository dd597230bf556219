//! Reference catalog snapshot and the index builder.
//!
//! [`CatalogSnapshot::build`] turns a [`RawCatalog`] into every derived index
//! in one pass, entirely off to one side. The result is immutable; the cache
//! publishes it by swapping a single `Arc`.

use chrono::{DateTime, Utc};
use shiftmatch_core::catalog::{
    AreaSummary, RawCatalog, RawShopRow, RawStationArea, ShopLocation, ShopRecord, ShopStation, StationSummary,
    UNKNOWN_DISTANCE_M,
};
use shiftmatch_core::types::ShopId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Area for stations missing from the station-area table.
pub const DEFAULT_AREA_ID: &str = "CENTER";

const DEFAULT_AREA_NAME: &str = "Центр";

/// Fixed district order for area menus; unknown areas sort after these.
pub const AREA_ORDER: [&str; 11] = [
    "CENTER",
    "NORTH",
    "NORTH_EAST",
    "EAST",
    "SOUTH_EAST",
    "SOUTH",
    "SOUTH_WEST",
    "WEST",
    "NORTH_WEST",
    "TINAO",
    "MO",
];

/// Display metadata for a known area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaPreset {
    /// Menu emoji
    pub emoji: &'static str,
    /// Menu title
    pub title: &'static str,
    /// Name used when the station-area table gives none
    pub fallback_name: &'static str,
}

/// Preset for a (canonical) area id.
#[must_use]
pub fn area_preset(area_id: &str) -> Option<AreaPreset> {
    let preset = |emoji, title, fallback_name| AreaPreset {
        emoji,
        title,
        fallback_name,
    };
    Some(match canonical_area_id(area_id).as_str() {
        "CENTER" => preset("🏛️", "Центр (ЦАО)", "Центр"),
        "NORTH" => preset("⬆️", "Север (САО)", "Север"),
        "NORTH_EAST" => preset("↗️", "Северо-Восток (СВАО)", "Северо-Восток"),
        "EAST" => preset("➡️", "Восток (ВАО)", "Восток"),
        "SOUTH_EAST" => preset("↘️", "Юго-Восток (ЮВАО)", "Юго-Восток"),
        "SOUTH" => preset("⬇️", "Юг (ЮАО)", "Юг"),
        "SOUTH_WEST" => preset("↙️", "Юго-Запад (ЮЗАО)", "Юго-Запад"),
        "WEST" => preset("⬅️", "Запад (ЗАО)", "Запад"),
        "NORTH_WEST" => preset("↖️", "Северо-Запад (СЗАО)", "Северо-Запад"),
        "TINAO" => preset("🏡", "ТиНАО", "ТиНАО"),
        "MO" => preset("🚆", "МО/Пригород", "МО/Пригород"),
        _ => return None,
    })
}

/// Upper-case an area id and fold aliases (`MOSCOW_REGION` is `MO`).
#[must_use]
pub fn canonical_area_id(area_id: &str) -> String {
    let upper = area_id.trim().to_uppercase();
    match upper.as_str() {
        "" => DEFAULT_AREA_ID.to_string(),
        "MOSCOW_REGION" => "MO".to_string(),
        _ => upper,
    }
}

fn area_display_name(area_id: &str, area_name: Option<&str>) -> String {
    match area_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => area_preset(area_id).map_or(DEFAULT_AREA_NAME, |p| p.fallback_name).to_string(),
    }
}

fn area_order_index(area_id: &str) -> usize {
    let canonical = canonical_area_id(area_id);
    AREA_ORDER
        .iter()
        .position(|id| *id == canonical)
        .unwrap_or(AREA_ORDER.len())
}

/// Parse an active flag: `0`, `false`, `no` and `нет` are false, anything else
/// (including blank) is true.
#[must_use]
pub fn parse_active(value: Option<&str>) -> bool {
    let text = value.unwrap_or("").trim().to_lowercase();
    !matches!(text.as_str(), "0" | "false" | "no" | "нет")
}

/// Parse a distance cell into whole meters.
///
/// Accepts `"350"`, `"350 м"`, `"1,2"`. Blank, unparsable and negative values
/// yield `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Range checked above the cast
pub fn parse_distance(value: Option<&str>) -> Option<u32> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }
    let normalized = text
        .to_lowercase()
        .replace('м', "")
        .replace('\u{a0}', " ")
        .trim()
        .replace(',', ".");
    let distance: f64 = normalized.parse().ok()?;
    if !distance.is_finite() || distance < 0.0 || distance > f64::from(u32::MAX) {
        return None;
    }
    Some(distance as u32)
}

/// Search key for a station name: lower-case, `ё` folded to `е`, separators
/// and brackets removed.
#[must_use]
pub fn normalize_station_query(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('ё', "е")
        .chars()
        .filter(|c| !matches!(c, '-' | '–' | '—' | '_' | ' ' | '(' | ')' | '«' | '»'))
        .collect()
}

fn resolve_shop_id(row: &RawShopRow) -> ShopId {
    let fallback = ShopId::new(i64::try_from(row.row_number).unwrap_or(i64::MAX));
    match row.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        None => fallback,
        Some(text) => text.parse::<i64>().map(ShopId::new).unwrap_or_else(|_| {
            tracing::warn!(
                raw_id = text,
                row = row.row_number,
                "Invalid shop id, using row number instead"
            );
            fallback
        }),
    }
}

fn station_area_map(rows: &[RawStationArea]) -> HashMap<String, (String, String)> {
    rows.iter()
        .filter_map(|row| {
            let station = row.station.trim();
            if station.is_empty() {
                return None;
            }
            let area_id = canonical_area_id(row.area_id.as_deref().unwrap_or(""));
            let area_name = area_display_name(&area_id, row.area_name.as_deref());
            Some((station.to_string(), (area_id, area_name)))
        })
        .collect()
}

/// An immutable, internally consistent view of the reference catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    shops: HashMap<ShopId, ShopRecord>,
    station_shops: HashMap<String, Vec<ShopLocation>>,
    stations: Vec<StationSummary>,
    station_index: HashMap<String, usize>,
    search_index: Vec<(String, usize)>,
    areas: Vec<AreaSummary>,
    area_index: HashMap<String, usize>,
    built_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// Snapshot with no data, served before the first successful refresh.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse raw rows and build every index.
    #[must_use]
    pub fn build(raw: &RawCatalog, built_at: DateTime<Utc>) -> Self {
        let area_map = station_area_map(&raw.station_areas);

        let mut shops: HashMap<ShopId, ShopRecord> = HashMap::new();
        // station -> shop -> smallest distance
        let mut per_station: BTreeMap<String, HashMap<ShopId, u32>> = BTreeMap::new();

        for row in &raw.shops {
            let name = row.name.trim();
            if name.is_empty() {
                continue;
            }
            let shop_id = resolve_shop_id(row);
            let mut stations = Vec::new();

            for (column, link) in row.stations.iter().enumerate() {
                let station = link.station.trim();
                if station.is_empty() {
                    continue;
                }
                let distance = parse_distance(link.distance.as_deref()).unwrap_or_else(|| {
                    tracing::warn!(
                        shop = name,
                        station,
                        row = row.row_number,
                        column = column + 1,
                        raw = ?link.distance,
                        fallback_m = UNKNOWN_DISTANCE_M,
                        "Missing or invalid station distance, using fallback"
                    );
                    UNKNOWN_DISTANCE_M
                });
                stations.push(ShopStation {
                    name: station.to_string(),
                    distance_m: distance,
                });
                per_station
                    .entry(station.to_string())
                    .or_default()
                    .entry(shop_id)
                    .and_modify(|current| *current = (*current).min(distance))
                    .or_insert(distance);
            }

            shops.insert(
                shop_id,
                ShopRecord {
                    id: shop_id,
                    name: name.to_string(),
                    stations,
                    is_active: parse_active(row.is_active.as_deref()),
                },
            );
        }

        if shops.is_empty() {
            tracing::warn!("Catalog has no shops; no options will be available");
        }

        let mut station_shops = HashMap::new();
        let mut stations = Vec::new();
        let mut area_stations: BTreeMap<String, Vec<StationSummary>> = BTreeMap::new();
        let mut area_shops: HashMap<String, HashSet<ShopId>> = HashMap::new();
        let mut area_names: HashMap<String, String> = HashMap::new();

        for (station, distances) in per_station {
            let mut locations: Vec<ShopLocation> = distances
                .into_iter()
                .filter_map(|(shop_id, distance_m)| {
                    shops.get(&shop_id).filter(|shop| shop.is_active).map(|shop| ShopLocation {
                        shop_id,
                        shop_name: shop.name.clone(),
                        distance_m,
                    })
                })
                .collect();
            if locations.is_empty() {
                continue;
            }
            locations.sort_by_cached_key(|l| (l.distance_m, l.shop_name.to_lowercase()));

            let (area_id, area_name) = area_map
                .get(&station)
                .cloned()
                .unwrap_or_else(|| (DEFAULT_AREA_ID.to_string(), DEFAULT_AREA_NAME.to_string()));
            area_names.entry(area_id.clone()).or_insert_with(|| area_name.clone());

            let summary = StationSummary {
                name: station.clone(),
                area_id: area_id.clone(),
                area_name,
                shop_count: locations.len(),
            };
            area_shops
                .entry(area_id.clone())
                .or_default()
                .extend(locations.iter().map(|l| l.shop_id));
            area_stations.entry(area_id).or_default().push(summary.clone());
            stations.push(summary);
            station_shops.insert(station, locations);
        }

        stations.sort_by_cached_key(|s| s.name.to_lowercase());
        let station_index = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let mut search_index: Vec<(String, usize)> = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (normalize_station_query(&s.name), i))
            .collect();
        search_index.sort();

        let mut areas: Vec<AreaSummary> = area_stations
            .into_iter()
            .map(|(area_id, mut items)| {
                items.sort_by_cached_key(|s| (std::cmp::Reverse(s.shop_count), s.name.to_lowercase()));
                let preset = area_preset(&area_id);
                let known_name = area_names.get(&area_id).cloned();
                AreaSummary {
                    emoji: preset.map(|p| p.emoji.to_string()).unwrap_or_default(),
                    title: preset
                        .map(|p| p.title.to_string())
                        .or_else(|| known_name.clone())
                        .unwrap_or_else(|| area_id.clone()),
                    area_name: known_name
                        .or_else(|| preset.map(|p| p.fallback_name.to_string()))
                        .unwrap_or_else(|| area_id.clone()),
                    shop_count: area_shops.get(&area_id).map_or(0, HashSet::len),
                    stations: items,
                    area_id,
                }
            })
            .collect();
        areas.sort_by_cached_key(|a| (area_order_index(&a.area_id), a.title.to_lowercase()));
        let area_index = areas
            .iter()
            .enumerate()
            .map(|(i, a)| (a.area_id.clone(), i))
            .collect();

        Self {
            shops,
            station_shops,
            stations,
            station_index,
            search_index,
            areas,
            area_index,
            built_at: Some(built_at),
        }
    }

    /// When this snapshot was built; `None` for the empty placeholder.
    #[must_use]
    pub const fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// Any shop, active or not.
    #[must_use]
    pub fn shop(&self, id: ShopId) -> Option<&ShopRecord> {
        self.shops.get(&id)
    }

    /// A shop that may be offered (exists and is active).
    #[must_use]
    pub fn active_shop(&self, id: ShopId) -> Option<&ShopRecord> {
        self.shop(id).filter(|shop| shop.is_active)
    }

    /// Display name of a known shop.
    #[must_use]
    pub fn shop_name(&self, id: ShopId) -> Option<&str> {
        self.shop(id).map(|shop| shop.name.as_str())
    }

    /// Number of active shops.
    #[must_use]
    pub fn active_shop_count(&self) -> usize {
        self.shops.values().filter(|shop| shop.is_active).count()
    }

    /// Every shop in the index.
    pub fn shops(&self) -> impl Iterator<Item = &ShopRecord> {
        self.shops.values()
    }

    /// Active shops near `station`, nearest first. Empty for unknown stations.
    #[must_use]
    pub fn station_shops(&self, station: &str) -> &[ShopLocation] {
        self.station_shops.get(station).map_or(&[], Vec::as_slice)
    }

    /// Summary of one station.
    #[must_use]
    pub fn station(&self, name: &str) -> Option<&StationSummary> {
        self.station_index.get(name).map(|&i| &self.stations[i])
    }

    /// Every station with at least one active shop, ordered by name.
    #[must_use]
    pub fn stations(&self) -> &[StationSummary] {
        &self.stations
    }

    /// Areas in menu order.
    #[must_use]
    pub fn areas(&self) -> &[AreaSummary] {
        &self.areas
    }

    /// One area by id (canonicalised before lookup).
    #[must_use]
    pub fn area(&self, area_id: &str) -> Option<&AreaSummary> {
        self.area_index
            .get(&canonical_area_id(area_id))
            .map(|&i| &self.areas[i])
    }

    /// Stations whose normalised name contains the normalised query.
    ///
    /// Returns at most `limit` matches; a query that normalises to nothing
    /// matches nothing.
    #[must_use]
    pub fn search_stations(&self, query: &str, limit: usize) -> Vec<&StationSummary> {
        let needle = normalize_station_query(query);
        if needle.is_empty() {
            return Vec::new();
        }
        self.search_index
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .map(|&(_, i)| &self.stations[i])
            .take(limit)
            .collect()
    }
}
