//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic
//! transaction as the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod applications;
pub mod customers;
pub mod drivers;
pub mod payments;
pub mod trips;
pub mod trucks;

const SQLITE_DB_URL: &str = "sqlite://data/freight_store.db";

pub fn db_url() -> String {
    let result = env::var("FSE_DATABASE_URL").unwrap_or_else(|_| {
        info!("FSE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// SQLite has a single writer, and a committed milestone must be visible to the very next read through the
/// same [`SqliteDatabase`](super::SqliteDatabase). A pool of one WAL connection satisfies both; extra pooled
/// connections can serve a reader a snapshot from before the write.
pub async fn new_pool(url: &str) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
    Ok(pool)
}
