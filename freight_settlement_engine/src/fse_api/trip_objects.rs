use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::TripStatus;

//--------------------------------------   TripQueryFilter    --------------------------------------------------------
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripQueryFilter {
    pub customer_id: Option<String>,
    pub assigned_driver_id: Option<String>,
    pub trip_status: Option<TripStatus>,
    pub tag: Option<String>,
}

impl TripQueryFilter {
    pub fn with_customer_id<S: Into<String>>(mut self, id: S) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    pub fn with_driver_id<S: Into<String>>(mut self, id: S) -> Self {
        self.assigned_driver_id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: TripStatus) -> Self {
        self.trip_status = Some(status);
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.assigned_driver_id.is_none()
            && self.trip_status.is_none()
            && self.tag.is_none()
    }
}

//--------------------------------------      TripUpdate      --------------------------------------------------------
/// A field patch for a trip. `total_cost` is absent on purpose: it is fixed at creation.
///
/// A patch that carries a `trip_status` of Confirmed, Cancelled or Completed is expanded by the API into the
/// compound trip-and-application write.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripUpdate {
    pub trip_status: Option<TripStatus>,
    pub cancellation_reason: Option<String>,
    pub truck_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TripUpdate {
    pub fn with_status(mut self, status: TripStatus) -> Self {
        self.trip_status = Some(status);
        self
    }

    pub fn with_cancellation_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.cancellation_reason = Some(reason.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.trip_status.is_none()
            && self.cancellation_reason.is_none()
            && self.truck_id.is_none()
            && self.tags.is_none()
    }
}

//--------------------------------------     TripSummary      --------------------------------------------------------
/// Aggregate trip counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TripSummary {
    pub pending: i64,
    pub assigned: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total: i64,
}

//--------------------------------------    CancellerRole     --------------------------------------------------------
/// Who asked for the trip to be cancelled. Only a customer cancelling a Confirmed (already-authorized) trip
/// triggers the financial penalty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellerRole {
    Customer,
    Driver,
    Admin,
}

impl Display for CancellerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellerRole::Customer => write!(f, "Customer"),
            CancellerRole::Driver => write!(f, "Driver"),
            CancellerRole::Admin => write!(f, "Admin"),
        }
    }
}
