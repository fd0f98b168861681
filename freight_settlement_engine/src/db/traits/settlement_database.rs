use chrono::{DateTime, Utc};
use fse_common::Money;
use thiserror::Error;

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
        Trip,
        TripId,
        Truck,
    },
    helpers::MaybeTransient,
    payment_objects::PaymentSummary,
    trip_objects::{TripQueryFilter, TripSummary, TripUpdate},
};

/// This trait defines the behaviour required of local stores backing the settlement engine.
///
/// The behaviour includes:
/// * Thin CRUD for the collaborator records (customers, drivers, trucks) the core flows read as preconditions.
/// * Trip storage, filtered reads, and the compound trip+application status writes.
/// * Driver-trip application storage and the atomic single-winner assignment.
/// * Payment storage and the atomic settlement milestones (authorize-record, settle, cancel).
///
/// Every method that documents itself as atomic MUST apply its writes in a single local transaction: a
/// concurrent reader may never observe a partially-applied milestone (e.g. siblings rejected but no winner
/// marked, or a confirmed payment without the matching earnings increment).
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //----------------------------------- Collaborator records -------------------------------------------------
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StorageError>;

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, StorageError>;

    /// Records the gateway customer reference and default payment method after a card has been saved.
    async fn set_customer_gateway_profile(
        &self,
        id: &str,
        gateway_customer_id: &str,
        default_payment_method: &str,
    ) -> Result<Customer, StorageError>;

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError>;

    async fn fetch_driver(&self, id: &str) -> Result<Option<Driver>, StorageError>;

    async fn insert_truck(&self, truck: NewTruck) -> Result<Truck, StorageError>;

    async fn fetch_truck(&self, id: &str) -> Result<Option<Truck>, StorageError>;

    //----------------------------------------- Trips ----------------------------------------------------------
    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip, StorageError>;

    async fn fetch_trip(&self, trip_id: &TripId) -> Result<Option<Trip>, StorageError>;

    /// Fetches trips according to the criteria in the filter, ordered by creation time, newest first.
    async fn search_trips(&self, query: TripQueryFilter) -> Result<Vec<Trip>, StorageError>;

    /// Applies a plain field patch to a trip. Does not touch any application; callers that change the trip
    /// status through one of the settlement milestones must use [`update_trip_and_application`] instead.
    async fn update_trip(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError>;

    /// Applies the patch to the trip AND transitions the winning application to the status matching the
    /// patch's trip status, in one atomic transaction. The patch must carry a trip status. Trips without a
    /// winning application (e.g. cancellation of a Pending trip) update the trip only.
    async fn update_trip_and_application(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, StorageError>;

    /// Hard-deletes a trip and its applications. Fails with [`StorageError::TripHasPayment`] once a payment
    /// row exists for the trip; such trips can only be cancelled.
    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), StorageError>;

    /// Aggregate trip counts by status. Pure read.
    async fn trip_summary(&self) -> Result<TripSummary, StorageError>;

    //-------------------------------------- Applications ------------------------------------------------------
    /// Creates a Pending application. The `(trip_id, driver_id)` pair is unique; a second application by the
    /// same driver fails with [`StorageError::DuplicateApplication`].
    async fn insert_application(&self, trip_id: &TripId, driver_id: &str) -> Result<DriverTripApplication, StorageError>;

    async fn fetch_application(&self, id: i64) -> Result<Option<DriverTripApplication>, StorageError>;

    async fn fetch_applications_for_trip(&self, trip_id: &TripId) -> Result<Vec<DriverTripApplication>, StorageError>;

    /// The single application for the trip currently holding a winning status, if any.
    async fn fetch_winning_application(&self, trip_id: &TripId) -> Result<Option<DriverTripApplication>, StorageError>;

    /// Promotes the application to the requested status and, in the same atomic transaction:
    /// * sets every sibling application for the trip to Rejected,
    /// * sets the trip to Assigned with the winner's driver id.
    ///
    /// A reader must never observe two live applications for one trip; the store's conflict detection is the
    /// safety net under concurrent assignment, surfaced as [`StorageError::TransientConflict`].
    async fn assign_application(&self, id: i64, status: ApplicationStatus) -> Result<DriverTripApplication, StorageError>;

    /// Hard-deletes the application row. Used to reverse a mistaken or duplicate application, not for
    /// trip-level cancellation.
    async fn delete_application(&self, id: i64) -> Result<(), StorageError>;

    //---------------------------------------- Payments --------------------------------------------------------
    /// In one atomic transaction, stores the payment row (status Pending) and sets the trip to Confirmed.
    /// Called after a successful gateway authorization; retried by the caller on transient conflicts.
    async fn insert_payment_and_confirm_trip(&self, payment: NewPayment) -> Result<Payment, StorageError>;

    /// Records a completed capture+transfer in one atomic transaction:
    /// * payment status → Confirmed,
    /// * driver `total_earnings` incremented by `driver_share` (in SQL, not read-modify-write),
    /// * trip status → Completed,
    /// * the assigned driver's application → Completed.
    async fn settle_payment(&self, payment_intent_id: &str, driver_share: Money) -> Result<Payment, StorageError>;

    /// Flags a payment whose capture succeeded but whose driver transfer failed. The payment moves to
    /// CapturedAwaitingTransfer and waits for out-of-band recovery.
    async fn mark_payment_captured(&self, payment_intent_id: &str) -> Result<Payment, StorageError>;

    /// Records a penalty cancellation in one atomic transaction: payment → Cancelled, trip → Cancelled with
    /// the given reason, and the winning application → Cancelled.
    async fn cancel_payment_and_trip(&self, payment_intent_id: &str, reason: &str) -> Result<Payment, StorageError>;

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, StorageError>;

    async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, StorageError>;

    async fn fetch_payment_for_trip(&self, trip_id: &TripId) -> Result<Option<Payment>, StorageError>;

    /// All payments, newest first.
    async fn fetch_payments(&self) -> Result<Vec<Payment>, StorageError>;

    /// Aggregate payment counts and confirmed volume. Pure read.
    async fn payment_summary(&self) -> Result<PaymentSummary, StorageError>;

    /// Payments created at or after the given instant, newest first.
    async fn payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, StorageError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    Backend(String),
    #[error("The local write hit a transient lock/serialization conflict")]
    TransientConflict,
    #[error("Driver {0} has already applied for trip {1}")]
    DuplicateApplication(String, TripId),
    #[error("A payment already exists for trip {0}")]
    DuplicatePaymentForTrip(TripId),
    #[error("The requested trip {0} does not exist")]
    TripNotFound(TripId),
    #[error("The requested driver trip application (id {0}) does not exist")]
    ApplicationNotFound(i64),
    #[error("The requested payment does not exist: {0}")]
    PaymentNotFound(String),
    #[error("The requested driver {0} does not exist")]
    DriverNotFound(String),
    #[error("The requested customer {0} does not exist")]
    CustomerNotFound(String),
    #[error("The requested truck {0} does not exist")]
    TruckNotFound(String),
    #[error("Trip {0} has no winning application")]
    NoWinningApplication(TripId),
    #[error("Trip {0} has a payment record and cannot be deleted; cancel it instead")]
    TripHasPayment(TripId),
}

impl MaybeTransient for StorageError {
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::TransientConflict)
    }
}

/// SQLite signals lock and serialization conflicts with the BUSY/LOCKED result-code family. These are the
/// only error classes that are safe to retry; everything else propagates as-is.
pub(crate) fn is_transient_db_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("5" | "6" | "261" | "262" | "517")),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.kind() == sqlx::error::ErrorKind::UniqueViolation,
        _ => false,
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient_db_error(&e) {
            return StorageError::TransientConflict;
        }
        StorageError::Backend(e.to_string())
    }
}
