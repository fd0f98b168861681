use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTruck, Truck},
    StorageError,
};

pub async fn insert_truck(truck: NewTruck, conn: &mut SqliteConnection) -> Result<Truck, StorageError> {
    let truck = sqlx::query_as("INSERT INTO trucks (id, registration) VALUES ($1, $2) RETURNING *")
        .bind(truck.id)
        .bind(truck.registration)
        .fetch_one(conn)
        .await?;
    Ok(truck)
}

pub async fn fetch_truck(id: &str, conn: &mut SqliteConnection) -> Result<Option<Truck>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM trucks WHERE id = $1").bind(id).fetch_optional(conn).await
}
