use fse_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Driver, NewDriver},
    StorageError,
};

pub async fn insert_driver(driver: NewDriver, conn: &mut SqliteConnection) -> Result<Driver, StorageError> {
    let driver = sqlx::query_as(
        "INSERT INTO drivers (id, name, account_status, payout_account_id) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(driver.id)
    .bind(driver.name)
    .bind(driver.account_status.to_string())
    .bind(driver.payout_account_id)
    .fetch_one(conn)
    .await?;
    Ok(driver)
}

pub async fn fetch_driver(id: &str, conn: &mut SqliteConnection) -> Result<Option<Driver>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM drivers WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Adds the payout amount to the driver's cumulative earnings ledger. The increment happens in SQL so that
/// concurrent settlements for different trips on the same driver cannot lose an update.
pub async fn incr_earnings(id: &str, amount: Money, conn: &mut SqliteConnection) -> Result<Driver, StorageError> {
    let driver: Option<Driver> = sqlx::query_as(
        "UPDATE drivers SET total_earnings = total_earnings + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING *",
    )
    .bind(amount)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    let driver = driver.ok_or_else(|| StorageError::DriverNotFound(id.to_string()))?;
    trace!("🗃️ Driver {id} earnings increased by {amount} to {}", driver.total_earnings);
    Ok(driver)
}
