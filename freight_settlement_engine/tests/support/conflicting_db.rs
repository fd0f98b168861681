//! A [`SettlementDatabase`] wrapper that fails the settlement-record write with a transient conflict a set
//! number of times before letting it through. Everything else delegates to the real backend.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use fse_common::Money;
use freight_settlement_engine::{
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
        Trip,
        TripId,
        Truck,
    },
    payment_objects::PaymentSummary,
    trip_objects::{TripQueryFilter, TripSummary, TripUpdate},
    SettlementDatabase,
    SqliteDatabase,
    StorageError,
};

#[derive(Clone)]
pub struct ConflictingDb {
    inner: SqliteDatabase,
    remaining: Arc<AtomicU32>,
}

impl ConflictingDb {
    /// Wraps `inner` so that the first `conflicts` calls to `insert_payment_and_confirm_trip` fail with
    /// [`StorageError::TransientConflict`].
    pub fn new(inner: SqliteDatabase, conflicts: u32) -> Self {
        Self { inner, remaining: Arc::new(AtomicU32::new(conflicts)) }
    }
}

impl SettlementDatabase for ConflictingDb {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StorageError> {
        self.inner.insert_customer(customer).await
    }

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, StorageError> {
        self.inner.fetch_customer(id).await
    }

    async fn set_customer_gateway_profile(
        &self,
        id: &str,
        gateway_customer_id: &str,
        default_payment_method: &str,
    ) -> Result<Customer, StorageError> {
        self.inner.set_customer_gateway_profile(id, gateway_customer_id, default_payment_method).await
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError> {
        self.inner.insert_driver(driver).await
    }

    async fn fetch_driver(&self, id: &str) -> Result<Option<Driver>, StorageError> {
        self.inner.fetch_driver(id).await
    }

    async fn insert_truck(&self, truck: NewTruck) -> Result<Truck, StorageError> {
        self.inner.insert_truck(truck).await
    }

    async fn fetch_truck(&self, id: &str) -> Result<Option<Truck>, StorageError> {
        self.inner.fetch_truck(id).await
    }

    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip, StorageError> {
        self.inner.insert_trip(trip).await
    }

    async fn fetch_trip(&self, trip_id: &TripId) -> Result<Option<Trip>, StorageError> {
        self.inner.fetch_trip(trip_id).await
    }

    async fn search_trips(&self, query: TripQueryFilter) -> Result<Vec<Trip>, StorageError> {
        self.inner.search_trips(query).await
    }

    async fn update_trip(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError> {
        self.inner.update_trip(trip_id, update).await
    }

    async fn update_trip_and_application(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError> {
        self.inner.update_trip_and_application(trip_id, update).await
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), StorageError> {
        self.inner.delete_trip(trip_id).await
    }

    async fn trip_summary(&self) -> Result<TripSummary, StorageError> {
        self.inner.trip_summary().await
    }

    async fn insert_application(
        &self,
        trip_id: &TripId,
        driver_id: &str,
    ) -> Result<DriverTripApplication, StorageError> {
        self.inner.insert_application(trip_id, driver_id).await
    }

    async fn fetch_application(&self, id: i64) -> Result<Option<DriverTripApplication>, StorageError> {
        self.inner.fetch_application(id).await
    }

    async fn fetch_applications_for_trip(&self, trip_id: &TripId) -> Result<Vec<DriverTripApplication>, StorageError> {
        self.inner.fetch_applications_for_trip(trip_id).await
    }

    async fn fetch_winning_application(&self, trip_id: &TripId) -> Result<Option<DriverTripApplication>, StorageError> {
        self.inner.fetch_winning_application(trip_id).await
    }

    async fn assign_application(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<DriverTripApplication, StorageError> {
        self.inner.assign_application(id, status).await
    }

    async fn delete_application(&self, id: i64) -> Result<(), StorageError> {
        self.inner.delete_application(id).await
    }

    async fn insert_payment_and_confirm_trip(&self, payment: NewPayment) -> Result<Payment, StorageError> {
        if self.remaining.load(Ordering::SeqCst) > 0 {
            self.remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(StorageError::TransientConflict);
        }
        self.inner.insert_payment_and_confirm_trip(payment).await
    }

    async fn settle_payment(&self, payment_intent_id: &str, driver_share: Money) -> Result<Payment, StorageError> {
        self.inner.settle_payment(payment_intent_id, driver_share).await
    }

    async fn mark_payment_captured(&self, payment_intent_id: &str) -> Result<Payment, StorageError> {
        self.inner.mark_payment_captured(payment_intent_id).await
    }

    async fn cancel_payment_and_trip(&self, payment_intent_id: &str, reason: &str) -> Result<Payment, StorageError> {
        self.inner.cancel_payment_and_trip(payment_intent_id, reason).await
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, StorageError> {
        self.inner.fetch_payment(id).await
    }

    async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, StorageError> {
        self.inner.fetch_payment_by_intent_id(payment_intent_id).await
    }

    async fn fetch_payment_for_trip(&self, trip_id: &TripId) -> Result<Option<Payment>, StorageError> {
        self.inner.fetch_payment_for_trip(trip_id).await
    }

    async fn fetch_payments(&self) -> Result<Vec<Payment>, StorageError> {
        self.inner.fetch_payments().await
    }

    async fn payment_summary(&self) -> Result<PaymentSummary, StorageError> {
        self.inner.payment_summary().await
    }

    async fn payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, StorageError> {
        self.inner.payments_since(since).await
    }
}
