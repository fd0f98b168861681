use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::traits::settlement_database::is_unique_violation,
    db_types::{ApplicationStatus, DriverTripApplication, TripId},
    StorageError,
};

/// Creates a Pending application. The `(trip_id, driver_id)` unique constraint turns a duplicate application
/// into [`StorageError::DuplicateApplication`].
pub async fn insert_application(
    trip_id: &TripId,
    driver_id: &str,
    conn: &mut SqliteConnection,
) -> Result<DriverTripApplication, StorageError> {
    let res = sqlx::query_as(
        "INSERT INTO trip_applications (trip_id, driver_id, status) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(trip_id.as_str())
    .bind(driver_id)
    .bind(ApplicationStatus::Pending.to_string())
    .fetch_one(conn)
    .await;
    match res {
        Ok(app) => {
            debug!("📋️ Driver {driver_id} applied for trip {trip_id}");
            Ok(app)
        },
        Err(e) if is_unique_violation(&e) => {
            Err(StorageError::DuplicateApplication(driver_id.to_string(), trip_id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_application(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DriverTripApplication>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM trip_applications WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_applications_for_trip(
    trip_id: &TripId,
    conn: &mut SqliteConnection,
) -> Result<Vec<DriverTripApplication>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM trip_applications WHERE trip_id = $1 ORDER BY created_at ASC")
        .bind(trip_id.as_str())
        .fetch_all(conn)
        .await
}

/// The single live application for the trip, if any. The single-winner invariant is what makes `LIMIT 1`
/// safe here.
pub async fn fetch_winning_application(
    trip_id: &TripId,
    conn: &mut SqliteConnection,
) -> Result<Option<DriverTripApplication>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM trip_applications WHERE trip_id = $1 AND status IN ('Assigned', 'Confirmed', 'Completed') \
         LIMIT 1",
    )
    .bind(trip_id.as_str())
    .fetch_optional(conn)
    .await
}

/// Sets every application for the trip other than the winner to Rejected. Part of the atomic assignment
/// transaction.
pub async fn reject_siblings(
    trip_id: &TripId,
    winner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, StorageError> {
    let res = sqlx::query(
        "UPDATE trip_applications SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE trip_id = $2 AND id != $3",
    )
    .bind(ApplicationStatus::Rejected.to_string())
    .bind(trip_id.as_str())
    .bind(winner_id)
    .execute(conn)
    .await?;
    trace!("📋️ {} sibling applications for trip {trip_id} rejected", res.rows_affected());
    Ok(res.rows_affected())
}

pub async fn update_status(
    id: i64,
    status: ApplicationStatus,
    conn: &mut SqliteConnection,
) -> Result<DriverTripApplication, StorageError> {
    let app: Option<DriverTripApplication> = sqlx::query_as(
        "UPDATE trip_applications SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    app.ok_or(StorageError::ApplicationNotFound(id))
}

/// Transitions the application of the trip's assigned driver in lockstep with a trip status change.
/// Returns `None` when the trip has no winning application (e.g. it was never assigned).
pub async fn update_status_for_winner(
    trip_id: &TripId,
    driver_id: &str,
    status: ApplicationStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<DriverTripApplication>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE trip_applications SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE trip_id = $2 AND driver_id = \
         $3 RETURNING *",
    )
    .bind(status.to_string())
    .bind(trip_id.as_str())
    .bind(driver_id)
    .fetch_optional(conn)
    .await
}

pub async fn delete_application(id: i64, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    let res = sqlx::query("DELETE FROM trip_applications WHERE id = $1").bind(id).execute(conn).await?;
    if res.rows_affected() == 0 {
        return Err(StorageError::ApplicationNotFound(id));
    }
    Ok(())
}

pub async fn delete_applications_for_trip(trip_id: &TripId, conn: &mut SqliteConnection) -> Result<u64, StorageError> {
    let res =
        sqlx::query("DELETE FROM trip_applications WHERE trip_id = $1").bind(trip_id.as_str()).execute(conn).await?;
    Ok(res.rows_affected())
}
