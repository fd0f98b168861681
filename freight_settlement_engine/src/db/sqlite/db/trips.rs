use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewTrip, Trip, TripId, TripStatus},
    trip_objects::{TripQueryFilter, TripSummary, TripUpdate},
    StorageError,
};

/// Inserts a new trip using the given connection. Not atomic by itself; pass `&mut *tx` to embed the call in
/// a transaction.
pub async fn insert_trip(trip: NewTrip, conn: &mut SqliteConnection) -> Result<Trip, StorageError> {
    let trip: Trip = sqlx::query_as(
        r#"
            INSERT INTO trips (trip_id, customer_id, truck_id, total_cost, tags)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(trip.trip_id)
    .bind(trip.customer_id)
    .bind(trip.truck_id)
    .bind(trip.total_cost)
    .bind(Json(trip.tags))
    .fetch_one(conn)
    .await?;
    debug!("🚚️ Trip [{}] inserted with id {}", trip.trip_id, trip.id);
    Ok(trip)
}

pub async fn fetch_trip(trip_id: &TripId, conn: &mut SqliteConnection) -> Result<Option<Trip>, sqlx::Error> {
    let trip =
        sqlx::query_as("SELECT * FROM trips WHERE trip_id = $1").bind(trip_id.as_str()).fetch_optional(conn).await?;
    Ok(trip)
}

/// Fetches trips according to the criteria specified in the `TripQueryFilter`.
///
/// Resulting trips are ordered by `created_at`, newest first.
pub async fn search_trips(query: TripQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Trip>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM trips ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(did) = query.assigned_driver_id {
        where_clause.push("assigned_driver_id = ");
        where_clause.push_bind_unseparated(did);
    }
    if let Some(status) = query.trip_status {
        where_clause.push("trip_status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(tag) = query.tag {
        // Tags are stored as a JSON array, so match on the JSON-encoded string.
        let encoded = serde_json::to_string(&tag).unwrap_or_default();
        where_clause.push("tags LIKE ");
        where_clause.push_bind_unseparated(format!("%{encoded}%"));
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("🚚️ Executing query: {}", builder.sql());
    let trips = builder.build_query_as::<Trip>().fetch_all(conn).await?;
    trace!("🚚️ Result of search_trips: {} rows", trips.len());
    Ok(trips)
}

/// Applies a field patch to a trip. `total_cost` is deliberately not patchable: it is fixed at creation and
/// settlement computes its shares from it.
pub async fn update_trip(
    trip_id: &TripId,
    update: TripUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Trip>, StorageError> {
    if update.is_empty() {
        debug!("🚚️ No fields to update for trip {trip_id}. Update request skipped.");
        return Ok(fetch_trip(trip_id, conn).await?);
    }
    let mut builder = QueryBuilder::new("UPDATE trips SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = update.trip_status {
        set_clause.push("trip_status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(reason) = update.cancellation_reason {
        set_clause.push("cancellation_reason = ");
        set_clause.push_bind_unseparated(reason);
    }
    if let Some(truck_id) = update.truck_id {
        set_clause.push("truck_id = ");
        set_clause.push_bind_unseparated(truck_id);
    }
    if let Some(tags) = update.tags {
        set_clause.push("tags = ");
        set_clause.push_bind_unseparated(Json(tags));
    }
    builder.push(" WHERE trip_id = ");
    builder.push_bind(trip_id.as_str());
    builder.push(" RETURNING *");
    trace!("🚚️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Trip::from_row(&row)).transpose()?;
    Ok(res)
}

/// Moves a trip into `Assigned` and records the winning driver. Part of the atomic assignment transaction.
pub async fn assign_driver(
    trip_id: &TripId,
    driver_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Trip, StorageError> {
    let trip: Option<Trip> = sqlx::query_as(
        "UPDATE trips SET trip_status = $1, assigned_driver_id = $2, updated_at = CURRENT_TIMESTAMP WHERE trip_id = \
         $3 RETURNING *",
    )
    .bind(TripStatus::Assigned.to_string())
    .bind(driver_id)
    .bind(trip_id.as_str())
    .fetch_optional(conn)
    .await?;
    trip.ok_or_else(|| StorageError::TripNotFound(trip_id.clone()))
}

pub async fn update_trip_status(
    trip_id: &TripId,
    status: TripStatus,
    reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Trip, StorageError> {
    let trip: Option<Trip> = match reason {
        Some(reason) => {
            sqlx::query_as(
                "UPDATE trips SET trip_status = $1, cancellation_reason = $2, updated_at = CURRENT_TIMESTAMP WHERE \
                 trip_id = $3 RETURNING *",
            )
            .bind(status.to_string())
            .bind(reason)
            .bind(trip_id.as_str())
            .fetch_optional(conn)
            .await?
        },
        None => {
            sqlx::query_as(
                "UPDATE trips SET trip_status = $1, updated_at = CURRENT_TIMESTAMP WHERE trip_id = $2 RETURNING *",
            )
            .bind(status.to_string())
            .bind(trip_id.as_str())
            .fetch_optional(conn)
            .await?
        },
    };
    trip.ok_or_else(|| StorageError::TripNotFound(trip_id.clone()))
}

pub async fn delete_trip(trip_id: &TripId, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    let res = sqlx::query("DELETE FROM trips WHERE trip_id = $1").bind(trip_id.as_str()).execute(conn).await?;
    if res.rows_affected() == 0 {
        return Err(StorageError::TripNotFound(trip_id.clone()));
    }
    Ok(())
}

pub async fn trip_summary(conn: &mut SqliteConnection) -> Result<TripSummary, StorageError> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT trip_status, COUNT(*) FROM trips GROUP BY trip_status").fetch_all(conn).await?;
    let mut summary = TripSummary::default();
    for (status, count) in rows {
        match TripStatus::from(status) {
            TripStatus::Pending => summary.pending = count,
            TripStatus::Assigned => summary.assigned = count,
            TripStatus::Confirmed => summary.confirmed = count,
            TripStatus::Completed => summary.completed = count,
            TripStatus::Cancelled => summary.cancelled = count,
        }
        summary.total += count;
    }
    Ok(summary)
}
