//! Request and user persistence.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shiftmatch_core::error::StoreError;
use shiftmatch_core::store::{BoxFuture, RequestStore};
use shiftmatch_core::types::{
    Capacity, NewRequest, PostRef, Request, RequestId, RequestKind, RequestPatch, RequestStatus, RowHandle,
    ShiftWindow, ShopId, StationContext, UserId, UserProfile,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

const REQUEST_COLUMNS: &str = "id, kind, shift_date, start_time, end_time, ends_at, shop_id, shop_name, \
     station, station_distance_m, position, note, author_id, status, capacity, claimant_ids, \
     filled_slots, channel_post_ref, created_at, updated_at";

fn unavailable(e: &sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// `PostgreSQL`-backed [`RequestStore`].
///
/// # Example
///
/// ```no_run
/// use shiftmatch_postgres::PostgresRequestStore;
///
/// # async fn example(pool: sqlx::PgPool) {
/// let store = PostgresRequestStore::from_pool(pool);
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn append_row(&self, request: NewRequest) -> Result<(RequestId, RowHandle), StoreError> {
        // max + 1 is not safe against concurrent appends from several
        // processes; a collision surfaces as a primary key violation.
        let (station, distance) = match &request.station {
            Some(ctx) => (Some(ctx.station.clone()), ctx.distance_m.and_then(|d| i32::try_from(d).ok())),
            None => (None, None),
        };
        let capacity = i64::try_from(request.capacity.value()).unwrap_or(i64::MAX);

        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO requests (
                id, kind, shift_date, start_time, end_time, ends_at, shop_id, shop_name,
                station, station_distance_m, position, note, author_id, status, capacity,
                claimant_ids, filled_slots, created_at, updated_at
            )
            SELECT COALESCE(MAX(id), 0) + 1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                   'open', $13, '{}', 0, $14, $14
            FROM requests
            RETURNING id
            ",
        )
        .bind(request.kind.as_str())
        .bind(request.shift.date())
        .bind(request.shift.start())
        .bind(request.shift.end())
        .bind(request.ends_at)
        .bind(request.shop_id.map(ShopId::value))
        .bind(&request.shop_name)
        .bind(station)
        .bind(distance)
        .bind(&request.position)
        .bind(&request.note)
        .bind(request.author_id.value())
        .bind(capacity)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        metrics::counter!("shiftmatch_store_appends_total").increment(1);
        Ok((RequestId::new(id), RowHandle(u64::try_from(id).unwrap_or_default())))
    }

    async fn update_row(&self, id: RequestId, patch: RequestPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return match self.find_row(id).await? {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(id)),
            };
        }

        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE requests SET ");
        {
            let mut set = query.separated(", ");
            if let Some(status) = patch.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(ids) = &patch.claimant_ids {
                let ids: Vec<i64> = ids.iter().map(|u| u.value()).collect();
                set.push("claimant_ids = ").push_bind_unseparated(ids);
            }
            if let Some(filled) = patch.filled_slots {
                set.push("filled_slots = ")
                    .push_bind_unseparated(i32::try_from(filled).unwrap_or(i32::MAX));
            }
            if let Some(post) = patch.channel_post_ref {
                set.push("channel_post_ref = ").push_bind_unseparated(post.map(PostRef::value));
            }
            if let Some(at) = patch.updated_at {
                set.push("updated_at = ").push_bind_unseparated(at);
            }
        }
        query.push(" WHERE id = ").push_bind(id.value());

        let result = query.build().execute(&self.pool).await.map_err(|e| unavailable(&e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn find_row(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable(&e))?;
        row.as_ref().map(row_to_request).transpose()
    }

    async fn list_rows(&self) -> Result<Vec<Request>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE status NOT IN ('expired', 'cancelled') ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        // One bad row must not hide the others from the sweeper.
        Ok(rows
            .iter()
            .filter_map(|row| match row_to_request(row) {
                Ok(request) => Some(request),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable request row");
                    None
                }
            })
            .collect())
    }

    async fn upsert_user_row(&self, profile: UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO users (id, role, username, phone_number, first_name, last_name, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                role = COALESCE(EXCLUDED.role, users.role),
                username = EXCLUDED.username,
                phone_number = COALESCE(EXCLUDED.phone_number, users.phone_number),
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(profile.id.value())
        .bind(profile.role.map(RequestKind::as_str))
        .bind(&profile.username)
        .bind(&profile.phone_number)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;
        Ok(())
    }

    async fn find_user_row(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, role, username, phone_number, first_name, last_name, updated_at FROM users WHERE id = $1",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let get_err = |e: sqlx::Error| StoreError::Unavailable(format!("user {id}: {e}"));
        let role: Option<String> = row.try_get("role").map_err(get_err)?;
        Ok(Some(UserProfile {
            id,
            // An unrecognised role is treated as unset.
            role: role.and_then(|r| r.parse().ok()),
            username: row.try_get("username").map_err(get_err)?,
            phone_number: row.try_get("phone_number").map_err(get_err)?,
            first_name: row.try_get("first_name").map_err(get_err)?,
            last_name: row.try_get("last_name").map_err(get_err)?,
            updated_at: row.try_get("updated_at").map_err(get_err)?,
        }))
    }
}

fn row_to_request(row: &PgRow) -> Result<Request, StoreError> {
    let raw_id: i64 = row.try_get("id").map_err(|e| unavailable(&e))?;
    let id = RequestId::new(raw_id);
    let corrupt = |reason: String| StoreError::Corrupt { id, reason };
    let column = |e: sqlx::Error| corrupt(e.to_string());

    let kind: String = row.try_get("kind").map_err(column)?;
    let status: String = row.try_get("status").map_err(column)?;
    let date: NaiveDate = row.try_get("shift_date").map_err(column)?;
    let start: NaiveTime = row.try_get("start_time").map_err(column)?;
    let end: NaiveTime = row.try_get("end_time").map_err(column)?;
    let ends_at: Option<DateTime<Utc>> = row.try_get("ends_at").map_err(column)?;
    let station: Option<String> = row.try_get("station").map_err(column)?;
    let distance: Option<i32> = row.try_get("station_distance_m").map_err(column)?;
    let capacity: i64 = row.try_get("capacity").map_err(column)?;
    let claimants: Vec<i64> = row.try_get("claimant_ids").map_err(column)?;
    let filled: i32 = row.try_get("filled_slots").map_err(column)?;

    Ok(Request {
        id,
        kind: kind.parse().map_err(corrupt)?,
        shift: ShiftWindow::restore(date, start, end),
        ends_at,
        shop_id: row.try_get::<Option<i64>, _>("shop_id").map_err(column)?.map(ShopId::new),
        shop_name: row.try_get("shop_name").map_err(column)?,
        station: station.map(|station| StationContext {
            station,
            distance_m: distance.and_then(|d| u32::try_from(d).ok()),
        }),
        position: row.try_get("position").map_err(column)?,
        note: row.try_get("note").map_err(column)?,
        author_id: UserId::new(row.try_get("author_id").map_err(column)?),
        status: status.parse::<RequestStatus>().map_err(corrupt)?,
        capacity: Capacity::clamped(capacity),
        claimant_ids: claimants.into_iter().map(UserId::new).collect(),
        filled_slots: usize::try_from(filled).unwrap_or_default(),
        channel_post_ref: row
            .try_get::<Option<i64>, _>("channel_post_ref")
            .map_err(column)?
            .map(PostRef::new),
        created_at: row.try_get("created_at").map_err(column)?,
        updated_at: row.try_get("updated_at").map_err(column)?,
    })
}

impl RequestStore for PostgresRequestStore {
    fn append(&self, request: NewRequest) -> BoxFuture<'_, Result<(RequestId, RowHandle), StoreError>> {
        Box::pin(self.append_row(request))
    }

    fn find(&self, id: RequestId) -> BoxFuture<'_, Result<Option<Request>, StoreError>> {
        Box::pin(self.find_row(id))
    }

    fn update_fields(&self, id: RequestId, patch: RequestPatch) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.update_row(id, patch))
    }

    fn list_active(&self) -> BoxFuture<'_, Result<Vec<Request>, StoreError>> {
        Box::pin(self.list_rows())
    }

    fn upsert_user(&self, profile: UserProfile) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.upsert_user_row(profile))
    }

    fn find_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<UserProfile>, StoreError>> {
        Box::pin(self.find_user_row(id))
    }
}
