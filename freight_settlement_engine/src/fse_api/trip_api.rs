use fse_common::Money;
use log::{debug, info};

use crate::{
    db_types::{NewTrip, Trip, TripId, TripStatus},
    fse_api::{
        errors::ApiError,
        settlement_api::SettlementApi,
        trip_objects::{CancellerRole, TripQueryFilter, TripSummary, TripUpdate},
    },
    helpers::{retry_on_conflict, MAX_CONFLICT_RETRIES},
    PaymentGateway,
    SettlementDatabase,
    StorageError,
};

pub const DEFAULT_CANCELLATION_REASON: &str = "Cancelled by user";

/// The trip lifecycle: creation, filtered reads, status transitions and cancellation.
///
/// The only path from here to the payment gateway is the penalty branch of [`Self::cancel_trip`], which
/// delegates to the settlement flow. Every other operation is purely local.
pub struct TripApi<B, G> {
    db: B,
    settlement: SettlementApi<B, G>,
}

impl<B, G> TripApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G) -> Self {
        let settlement = SettlementApi::new(db.clone(), gateway);
        Self { db, settlement }
    }

    //----------------------------------------- Creation -------------------------------------------------------
    /// Creates a Pending trip for the customer.
    ///
    /// Preconditions, checked in order:
    /// * the customer exists and has a saved payment profile (trips without a chargeable customer are
    ///   stillborn, so this is checked up front),
    /// * the truck exists,
    /// * at least one tag is supplied.
    pub async fn create_trip(
        &self,
        customer_id: &str,
        truck_id: &str,
        total_cost: Money,
        tags: Vec<String>,
    ) -> Result<Trip, ApiError> {
        let customer = self
            .db
            .fetch_customer(customer_id)
            .await?
            .ok_or(StorageError::CustomerNotFound(customer_id.to_string()))?;
        if customer.gateway_customer_id.is_none() {
            return Err(ApiError::PreconditionFailed(format!(
                "Customer {customer_id} must save a payment method before creating trips"
            )));
        }
        if self.db.fetch_truck(truck_id).await?.is_none() {
            return Err(StorageError::TruckNotFound(truck_id.to_string()).into());
        }
        if tags.is_empty() {
            return Err(ApiError::PreconditionFailed("A trip needs at least one tag".to_string()));
        }
        let trip = self.db.insert_trip(NewTrip::new(customer_id, truck_id, total_cost).with_tags(tags)).await?;
        info!("📝️ Customer {customer_id} created trip {} for {total_cost}", trip.trip_id);
        Ok(trip)
    }

    //------------------------------------------- Reads --------------------------------------------------------
    pub async fn trip(&self, trip_id: &TripId) -> Result<Option<Trip>, ApiError> {
        Ok(self.db.fetch_trip(trip_id).await?)
    }

    pub async fn trips(&self, filter: TripQueryFilter) -> Result<Vec<Trip>, ApiError> {
        Ok(self.db.search_trips(filter).await?)
    }

    pub async fn summary(&self) -> Result<TripSummary, ApiError> {
        Ok(self.db.trip_summary().await?)
    }

    //------------------------------------------ Updates -------------------------------------------------------
    /// Applies a field patch to the trip. A patch carrying a Confirmed, Cancelled or Completed status is a
    /// lifecycle milestone and uses the compound trip-and-application write so the winning application moves
    /// with the trip; anything else is a plain update.
    pub async fn update_trip(&self, trip_id: &TripId, update: TripUpdate) -> Result<Trip, ApiError> {
        let is_milestone = matches!(
            update.trip_status,
            Some(TripStatus::Confirmed | TripStatus::Cancelled | TripStatus::Completed)
        );
        let trip = if is_milestone {
            retry_on_conflict(MAX_CONFLICT_RETRIES, || self.db.update_trip_and_application(trip_id, update.clone()))
                .await?
        } else {
            self.db.update_trip(trip_id, update).await?
        };
        debug!("📝️ Updated trip {trip_id} (status: {})", trip.trip_status);
        Ok(trip)
    }

    //---------------------------------------- Cancellation ----------------------------------------------------
    /// Cancels a trip on behalf of `role`.
    ///
    /// Exactly one combination carries a financial consequence: a *customer* cancelling a *Confirmed* trip,
    /// whose held funds are captured with 80% refunded (the 20% penalty stays with the platform). Every other
    /// combination, including a driver cancelling a Confirmed trip, is a plain status write with zero gateway
    /// calls.
    pub async fn cancel_trip(
        &self,
        trip_id: &TripId,
        role: CancellerRole,
        reason: Option<String>,
    ) -> Result<Trip, ApiError> {
        let trip = self
            .db
            .fetch_trip(trip_id)
            .await?
            .ok_or(StorageError::TripNotFound(trip_id.clone()))?;
        if matches!(trip.trip_status, TripStatus::Completed | TripStatus::Cancelled) {
            return Err(ApiError::Conflict(format!(
                "Trip {trip_id} cannot be cancelled from status {}",
                trip.trip_status
            )));
        }
        let reason = reason.unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());
        if role == CancellerRole::Customer && trip.trip_status == TripStatus::Confirmed {
            self.settlement.cancel_with_penalty(&trip, &reason).await?;
            let trip = self
                .db
                .fetch_trip(trip_id)
                .await?
                .ok_or(StorageError::TripNotFound(trip_id.clone()))?;
            info!("📝️ Customer cancelled confirmed trip {trip_id} with penalty. Reason: {reason}");
            return Ok(trip);
        }
        let update = TripUpdate::default().with_status(TripStatus::Cancelled).with_cancellation_reason(reason.clone());
        let trip =
            retry_on_conflict(MAX_CONFLICT_RETRIES, || self.db.update_trip_and_application(trip_id, update.clone()))
                .await?;
        info!("📝️ {role} cancelled trip {trip_id} without penalty. Reason: {reason}");
        Ok(trip)
    }

    //------------------------------------------ Deletion ------------------------------------------------------
    /// Hard-deletes a trip and its applications. Refused once a payment exists for the trip; such trips can
    /// only be cancelled, since their payment row is part of the financial record.
    pub async fn delete_trip(&self, trip_id: &TripId) -> Result<(), ApiError> {
        self.db.delete_trip(trip_id).await?;
        info!("📝️ Deleted trip {trip_id}");
        Ok(())
    }
}
