use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::traits::settlement_database::is_unique_violation,
    db_types::{NewPayment, Payment, PaymentStatus, TripId},
    payment_objects::PaymentSummary,
    StorageError,
};

/// Stores the payment record created by a successful authorization. A second payment for the same trip (or a
/// replayed intent id) violates a unique constraint and surfaces as
/// [`StorageError::DuplicatePaymentForTrip`].
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, StorageError> {
    let trip_id = payment.trip_id.clone();
    let res = sqlx::query_as(
        r#"
            INSERT INTO payments (
                payment_intent_id,
                trip_id,
                customer_id,
                driver_id,
                amount,
                application_fee,
                payment_method_id,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_intent_id)
    .bind(payment.trip_id)
    .bind(payment.customer_id)
    .bind(payment.driver_id)
    .bind(payment.amount)
    .bind(payment.application_fee)
    .bind(payment.payment_method_id)
    .bind(PaymentStatus::Pending.to_string())
    .fetch_one(conn)
    .await;
    match res {
        Ok(payment) => {
            let payment: Payment = payment;
            debug!("💳️ Payment [{}] recorded for trip {}", payment.payment_intent_id, payment.trip_id);
            Ok(payment)
        },
        Err(e) if is_unique_violation(&e) => Err(StorageError::DuplicatePaymentForTrip(trip_id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payment_by_intent_id(
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_payment_for_trip(
    trip_id: &TripId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE trip_id = $1").bind(trip_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_payments(conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments ORDER BY created_at DESC").fetch_all(conn).await
}

pub async fn fetch_payments_since(
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE created_at >= $1 ORDER BY created_at DESC")
        .bind(since)
        .fetch_all(conn)
        .await
}

pub async fn update_status(
    payment_intent_id: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Payment, StorageError> {
    let payment: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE payment_intent_id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(payment_intent_id)
    .fetch_optional(conn)
    .await?;
    payment.ok_or_else(|| StorageError::PaymentNotFound(payment_intent_id.to_string()))
}

pub async fn payment_summary(conn: &mut SqliteConnection) -> Result<PaymentSummary, StorageError> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM payments GROUP BY status").fetch_all(&mut *conn).await?;
    let mut summary = PaymentSummary::default();
    for (status, count) in rows {
        match PaymentStatus::from(status) {
            PaymentStatus::Pending => summary.pending = count,
            PaymentStatus::CapturedAwaitingTransfer => summary.awaiting_transfer = count,
            PaymentStatus::Confirmed => summary.confirmed = count,
            PaymentStatus::Cancelled => summary.cancelled = count,
        }
        summary.total += count;
    }
    let (volume, fees): (Option<i64>, Option<i64>) =
        sqlx::query_as("SELECT SUM(amount), SUM(application_fee) FROM payments WHERE status = 'Confirmed'")
            .fetch_one(conn)
            .await?;
    summary.confirmed_volume = volume.unwrap_or_default().into();
    summary.confirmed_fees = fees.unwrap_or_default().into();
    Ok(summary)
}
