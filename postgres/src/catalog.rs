//! Raw catalog rows read from the `shops` and `station_areas` tables.

use shiftmatch_core::catalog::{MAX_STATIONS_PER_SHOP, RawCatalog, RawShopRow, RawStationArea, RawStationLink};
use shiftmatch_core::error::CatalogError;
use shiftmatch_core::store::{BoxFuture, CatalogSource};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed [`CatalogSource`].
///
/// Cells are returned as text, exactly as operators typed them; parsing and
/// validation happen when the snapshot is built.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self) -> Result<RawCatalog, CatalogError> {
        let shop_rows = sqlx::query(
            r"
            SELECT row_number, shop_id, name, is_active,
                   station_1, distance_1, station_2, distance_2, station_3, distance_3
            FROM shops
            ORDER BY row_number
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError(format!("failed to read shops: {e}")))?;

        let area_rows = sqlx::query("SELECT station, area_id, area_name FROM station_areas")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError(format!("failed to read station areas: {e}")))?;

        let shops = shop_rows.iter().map(row_to_shop).collect::<Result<Vec<_>, _>>()?;
        let station_areas = area_rows
            .iter()
            .map(|row| {
                Ok(RawStationArea {
                    station: row.try_get("station")?,
                    area_id: row.try_get("area_id")?,
                    area_name: row.try_get("area_name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| CatalogError(format!("bad station area row: {e}")))?;

        tracing::debug!(shops = shops.len(), station_areas = station_areas.len(), "Catalog rows fetched");
        Ok(RawCatalog { shops, station_areas })
    }
}

fn row_to_shop(row: &PgRow) -> Result<RawShopRow, CatalogError> {
    let bad = |e: sqlx::Error| CatalogError(format!("bad shop row: {e}"));
    let row_number: i64 = row.try_get("row_number").map_err(bad)?;

    let mut stations = Vec::with_capacity(MAX_STATIONS_PER_SHOP);
    for n in 1..=MAX_STATIONS_PER_SHOP {
        let station: Option<String> = row.try_get(format!("station_{n}").as_str()).map_err(bad)?;
        let distance: Option<String> = row.try_get(format!("distance_{n}").as_str()).map_err(bad)?;
        if let Some(station) = station {
            stations.push(RawStationLink { station, distance });
        }
    }

    Ok(RawShopRow {
        row_number: usize::try_from(row_number).unwrap_or_default(),
        id: row.try_get("shop_id").map_err(bad)?,
        name: row.try_get::<Option<String>, _>("name").map_err(bad)?.unwrap_or_default(),
        is_active: row.try_get("is_active").map_err(bad)?,
        stations,
    })
}

impl CatalogSource for PostgresCatalog {
    fn fetch_all(&self) -> BoxFuture<'_, Result<RawCatalog, CatalogError>> {
        Box::pin(self.fetch())
    }
}
