//! `SqliteDatabase` is the concrete SQLite backend for the freight settlement engine.
//!
//! It implements [`SettlementDatabase`] on top of the low-level query functions in the [`db`] module. Every
//! settlement milestone that the trait documents as atomic is wrapped in a single sqlx transaction here.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use fse_common::Money;
use log::{debug, trace, warn};
use sqlx::SqlitePool;

use super::db::{applications, customers, drivers, payments, trips, trucks};
use crate::{
    db_types::{
        ApplicationStatus,
        Customer,
        Driver,
        DriverTripApplication,
        NewCustomer,
        NewDriver,
        NewPayment,
        NewTrip,
        NewTruck,
        Payment,
        PaymentStatus,
        Trip,
        TripId,
        TripStatus,
        Truck,
    },
    payment_objects::PaymentSummary,
    trip_objects::{TripQueryFilter, TripSummary, TripUpdate},
    SettlementDatabase,
    StorageError,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool for the given URL.
    pub async fn new_with_url(url: &str) -> Result<Self, StorageError> {
        let pool = super::db::new_pool(url).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Creates a new database connection using `FSE_DATABASE_URL`, or the default URL.
    pub async fn new_default() -> Result<Self, StorageError> {
        let url = super::db::db_url();
        Self::new_with_url(&url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The application-status transition that accompanies a trip-status transition made through the
    /// compound update path.
    fn application_status_for(status: TripStatus) -> Option<ApplicationStatus> {
        match status {
            TripStatus::Confirmed => Some(ApplicationStatus::Confirmed),
            TripStatus::Cancelled => Some(ApplicationStatus::Cancelled),
            TripStatus::Completed => Some(ApplicationStatus::Completed),
            TripStatus::Pending | TripStatus::Assigned => None,
        }
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StorageError> {
        let mut conn = self.pool.acquire().await?;
        customers::insert_customer(customer, &mut conn).await
    }

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(customers::fetch_customer(id, &mut conn).await?)
    }

    async fn set_customer_gateway_profile(
        &self,
        id: &str,
        gateway_customer_id: &str,
        default_payment_method: &str,
    ) -> Result<Customer, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let customer =
            customers::set_gateway_profile(id, gateway_customer_id, default_payment_method, &mut conn).await?;
        debug!("🗃️ Customer {id} linked to gateway profile");
        Ok(customer)
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError> {
        let mut conn = self.pool.acquire().await?;
        drivers::insert_driver(driver, &mut conn).await
    }

    async fn fetch_driver(&self, id: &str) -> Result<Option<Driver>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(drivers::fetch_driver(id, &mut conn).await?)
    }

    async fn insert_truck(&self, truck: NewTruck) -> Result<Truck, StorageError> {
        let mut conn = self.pool.acquire().await?;
        trucks::insert_truck(truck, &mut conn).await
    }

    async fn fetch_truck(&self, id: &str) -> Result<Option<Truck>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(trucks::fetch_truck(id, &mut conn).await?)
    }

    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip, StorageError> {
        let mut conn = self.pool.acquire().await?;
        trips::insert_trip(trip, &mut conn).await
    }

    async fn fetch_trip(&self, trip_id: &TripId) -> Result<Option<Trip>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(trips::fetch_trip(trip_id, &mut conn).await?)
    }

    async fn search_trips(&self, query: TripQueryFilter) -> Result<Vec<Trip>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(trips::search_trips(query, &mut conn).await?)
    }

    async fn update_trip(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let trip = trips::update_trip(trip_id, update, &mut conn).await?;
        trip.ok_or_else(|| StorageError::TripNotFound(trip_id.clone()))
    }

    async fn update_trip_and_application(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError> {
        let status = match update.trip_status {
            Some(s) => s,
            None => return self.update_trip(trip_id, update).await,
        };
        let mut tx = self.pool.begin().await?;
        let trip = trips::update_trip(trip_id, update, &mut tx)
            .await?
            .ok_or_else(|| StorageError::TripNotFound(trip_id.clone()))?;
        if let Some(app_status) = Self::application_status_for(status) {
            let winner = match trip.assigned_driver_id.as_deref() {
                Some(driver_id) => {
                    applications::update_status_for_winner(trip_id, driver_id, app_status, &mut tx).await?
                },
                None => None,
            };
            match winner {
                Some(app) => {
                    trace!("🗃️ Application {} for trip {trip_id} moved to {app_status} with the trip", app.id)
                },
                None => trace!("🗃️ Trip {trip_id} has no winning application to move to {app_status}"),
            }
        }
        tx.commit().await?;
        debug!("🗃️ Trip {trip_id} and its winning application updated to {status}");
        Ok(trip)
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        if payments::fetch_payment_for_trip(trip_id, &mut tx).await?.is_some() {
            return Err(StorageError::TripHasPayment(trip_id.clone()));
        }
        let n = applications::delete_applications_for_trip(trip_id, &mut tx).await?;
        trips::delete_trip(trip_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Trip {trip_id} deleted along with {n} applications");
        Ok(())
    }

    async fn trip_summary(&self) -> Result<TripSummary, StorageError> {
        let mut conn = self.pool.acquire().await?;
        trips::trip_summary(&mut conn).await
    }

    async fn insert_application(
        &self,
        trip_id: &TripId,
        driver_id: &str,
    ) -> Result<DriverTripApplication, StorageError> {
        let mut conn = self.pool.acquire().await?;
        applications::insert_application(trip_id, driver_id, &mut conn).await
    }

    async fn fetch_application(&self, id: i64) -> Result<Option<DriverTripApplication>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_application(id, &mut conn).await?)
    }

    async fn fetch_applications_for_trip(&self, trip_id: &TripId) -> Result<Vec<DriverTripApplication>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_applications_for_trip(trip_id, &mut conn).await?)
    }

    async fn fetch_winning_application(&self, trip_id: &TripId) -> Result<Option<DriverTripApplication>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(applications::fetch_winning_application(trip_id, &mut conn).await?)
    }

    async fn assign_application(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<DriverTripApplication, StorageError> {
        let mut tx = self.pool.begin().await?;
        let app = applications::fetch_application(id, &mut tx).await?.ok_or(StorageError::ApplicationNotFound(id))?;
        applications::reject_siblings(&app.trip_id, id, &mut tx).await?;
        let winner = applications::update_status(id, status, &mut tx).await?;
        trips::assign_driver(&app.trip_id, &winner.driver_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Driver {} assigned to trip {}; all other applications rejected", winner.driver_id, app.trip_id);
        Ok(winner)
    }

    async fn delete_application(&self, id: i64) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        applications::delete_application(id, &mut conn).await
    }

    async fn insert_payment_and_confirm_trip(&self, payment: NewPayment) -> Result<Payment, StorageError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        trips::update_trip_status(&payment.trip_id, TripStatus::Confirmed, None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment [{}] recorded and trip {} confirmed", payment.payment_intent_id, payment.trip_id);
        Ok(payment)
    }

    async fn settle_payment(&self, payment_intent_id: &str, driver_share: Money) -> Result<Payment, StorageError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::update_status(payment_intent_id, PaymentStatus::Confirmed, &mut tx).await?;
        drivers::incr_earnings(&payment.driver_id, driver_share, &mut tx).await?;
        let trip = trips::update_trip_status(&payment.trip_id, TripStatus::Completed, None, &mut tx).await?;
        let driver_id = trip
            .assigned_driver_id
            .as_deref()
            .ok_or_else(|| StorageError::NoWinningApplication(payment.trip_id.clone()))?;
        applications::update_status_for_winner(&payment.trip_id, driver_id, ApplicationStatus::Completed, &mut tx)
            .await?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment [{payment_intent_id}] settled: {driver_share} credited to driver {driver_id}, trip {} \
             completed",
            payment.trip_id
        );
        Ok(payment)
    }

    async fn mark_payment_captured(&self, payment_intent_id: &str) -> Result<Payment, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::update_status(payment_intent_id, PaymentStatus::CapturedAwaitingTransfer, &mut conn)
            .await?;
        warn!("🗃️ Payment [{payment_intent_id}] captured but awaiting a driver transfer");
        Ok(payment)
    }

    async fn cancel_payment_and_trip(&self, payment_intent_id: &str, reason: &str) -> Result<Payment, StorageError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::update_status(payment_intent_id, PaymentStatus::Cancelled, &mut tx).await?;
        let trip = trips::update_trip_status(&payment.trip_id, TripStatus::Cancelled, Some(reason), &mut tx).await?;
        if let Some(driver_id) = trip.assigned_driver_id.as_deref() {
            applications::update_status_for_winner(&payment.trip_id, driver_id, ApplicationStatus::Cancelled, &mut tx)
                .await?;
        }
        tx.commit().await?;
        debug!("🗃️ Payment [{payment_intent_id}] cancelled and trip {} cancelled: {reason}", payment.trip_id);
        Ok(payment)
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(id, &mut conn).await?)
    }

    async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_intent_id(payment_intent_id, &mut conn).await?)
    }

    async fn fetch_payment_for_trip(&self, trip_id: &TripId) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_for_trip(trip_id, &mut conn).await?)
    }

    async fn fetch_payments(&self) -> Result<Vec<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payments(&mut conn).await?)
    }

    async fn payment_summary(&self) -> Result<PaymentSummary, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::payment_summary(&mut conn).await
    }

    async fn payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payments_since(since, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}
