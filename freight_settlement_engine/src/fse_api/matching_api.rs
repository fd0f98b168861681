use log::{debug, info};

use crate::{
    db_types::{AccountStatus, ApplicationStatus, DriverTripApplication, TripId, TripStatus},
    fse_api::errors::ApiError,
    helpers::{retry_on_conflict, MAX_CONFLICT_RETRIES},
    SettlementDatabase,
    StorageError,
};

/// The driver-matching flow: drivers apply for open trips, and exactly one application wins.
///
/// `MatchingApi` never talks to the payment gateway. All of its writes are local, so the compound assignment
/// transaction can safely be retried on transient store conflicts.
pub struct MatchingApi<B> {
    db: B,
}

impl<B> MatchingApi<B>
where B: SettlementDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Files a Pending application by `driver_id` for the given trip.
    ///
    /// Preconditions, checked in order:
    /// * the driver exists and their account is Verified,
    /// * the trip exists and is still open for applications (Pending).
    pub async fn apply(&self, trip_id: &TripId, driver_id: &str) -> Result<DriverTripApplication, ApiError> {
        let driver = self
            .db
            .fetch_driver(driver_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Driver {driver_id} does not exist")))?;
        if driver.account_status != AccountStatus::Verified {
            return Err(ApiError::PreconditionFailed(format!(
                "Driver {driver_id} is not verified yet (status: {})",
                driver.account_status
            )));
        }
        let trip = self
            .db
            .fetch_trip(trip_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Trip {trip_id} does not exist")))?;
        if trip.trip_status != TripStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "Trip {trip_id} is no longer open for applications (status: {})",
                trip.trip_status
            )));
        }
        let application = self.db.insert_application(trip_id, driver_id).await?;
        info!("🚚 Driver {driver_id} applied for trip {trip_id} (application {})", application.id);
        Ok(application)
    }

    /// Promotes one application to the winner. Siblings are rejected and the trip moves to Assigned with the
    /// winning driver, all in one store transaction. Retried on transient conflicts; when two assignments race,
    /// exactly one commits.
    ///
    /// `status` defaults to [`ApplicationStatus::Assigned`]; passing a non-winning status is rejected before
    /// anything is written.
    pub async fn assign(
        &self,
        application_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<DriverTripApplication, ApiError> {
        let status = status.unwrap_or(ApplicationStatus::Assigned);
        if !status.is_winning() {
            return Err(ApiError::PreconditionFailed(format!(
                "Cannot assign an application to non-winning status {status}"
            )));
        }
        let winner = retry_on_conflict(MAX_CONFLICT_RETRIES, || self.db.assign_application(application_id, status))
            .await?;
        info!(
            "🚚 Application {application_id} won trip {}. Driver {} is assigned.",
            winner.trip_id, winner.driver_id
        );
        Ok(winner)
    }

    /// Removes an application that has not won. Winning applications belong to the trip lifecycle and can only
    /// change through trip-level transitions.
    pub async fn withdraw(&self, application_id: i64) -> Result<(), ApiError> {
        let application = self
            .db
            .fetch_application(application_id)
            .await?
            .ok_or(StorageError::ApplicationNotFound(application_id))?;
        if application.status.is_winning() {
            return Err(ApiError::Conflict(format!(
                "Application {application_id} has won trip {} and cannot be withdrawn",
                application.trip_id
            )));
        }
        self.db.delete_application(application_id).await?;
        debug!("🚚 Application {application_id} withdrawn");
        Ok(())
    }

    pub async fn application(&self, application_id: i64) -> Result<Option<DriverTripApplication>, ApiError> {
        Ok(self.db.fetch_application(application_id).await?)
    }

    pub async fn applications_for_trip(&self, trip_id: &TripId) -> Result<Vec<DriverTripApplication>, ApiError> {
        Ok(self.db.fetch_applications_for_trip(trip_id).await?)
    }

    pub async fn winning_application(&self, trip_id: &TripId) -> Result<Option<DriverTripApplication>, ApiError> {
        Ok(self.db.fetch_winning_application(trip_id).await?)
    }
}
