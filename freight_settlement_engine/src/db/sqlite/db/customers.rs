use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, NewCustomer},
    StorageError,
};

pub async fn insert_customer(customer: NewCustomer, conn: &mut SqliteConnection) -> Result<Customer, StorageError> {
    let customer = sqlx::query_as("INSERT INTO customers (id, name, email) VALUES ($1, $2, $3) RETURNING *")
        .bind(customer.id)
        .bind(customer.name)
        .bind(customer.email)
        .fetch_one(conn)
        .await?;
    Ok(customer)
}

pub async fn fetch_customer(id: &str, conn: &mut SqliteConnection) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn set_gateway_profile(
    id: &str,
    gateway_customer_id: &str,
    default_payment_method: &str,
    conn: &mut SqliteConnection,
) -> Result<Customer, StorageError> {
    let customer: Option<Customer> = sqlx::query_as(
        "UPDATE customers SET gateway_customer_id = $1, default_payment_method = $2, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $3 RETURNING *",
    )
    .bind(gateway_customer_id)
    .bind(default_payment_method)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    customer.ok_or_else(|| StorageError::CustomerNotFound(id.to_string()))
}
