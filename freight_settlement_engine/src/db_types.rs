use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fse_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        TripId        --------------------------------------------------------
/// A lightweight wrapper around the public identifier of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TripId(pub String);

impl TripId {
    /// Generates a fresh random trip id.
    pub fn random() -> Self {
        Self(format!("trip{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TripId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TripId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      TripStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TripStatus {
    /// The trip has been created and drivers may apply for it.
    Pending,
    /// A single winning driver has been assigned.
    Assigned,
    /// The customer's funds are on hold and the trip may be executed.
    Confirmed,
    /// The trip is done and the payment has been captured and split.
    Completed,
    /// The trip was cancelled. `cancellation_reason` carries the why.
    Cancelled,
}

impl Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripStatus::Pending => write!(f, "Pending"),
            TripStatus::Assigned => write!(f, "Assigned"),
            TripStatus::Confirmed => write!(f, "Confirmed"),
            TripStatus::Completed => write!(f, "Completed"),
            TripStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for TripStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Assigned" => Ok(Self::Assigned),
            "Confirmed" => Ok(Self::Confirmed),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid trip status: {s}"))),
        }
    }
}

impl From<String> for TripStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid trip status: {value}. But this conversion cannot fail. Defaulting to Pending");
            TripStatus::Pending
        })
    }
}

//--------------------------------------  ApplicationStatus   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Assigned,
    Rejected,
    Confirmed,
    Cancelled,
    Completed,
}

impl ApplicationStatus {
    /// A winning status marks the single live application for a trip. At most one application per trip may
    /// hold one of these at any time.
    pub fn is_winning(&self) -> bool {
        matches!(self, Self::Assigned | Self::Confirmed | Self::Completed)
    }
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "Pending"),
            ApplicationStatus::Assigned => write!(f, "Assigned"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Confirmed => write!(f, "Confirmed"),
            ApplicationStatus::Cancelled => write!(f, "Cancelled"),
            ApplicationStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Assigned" => Ok(Self::Assigned),
            "Rejected" => Ok(Self::Rejected),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            "Completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid application status: {s}"))),
        }
    }
}

impl From<String> for ApplicationStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid application status: {value}. But this conversion cannot fail. Defaulting to Pending");
            ApplicationStatus::Pending
        })
    }
}

//--------------------------------------    PaymentStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Funds are on hold at the gateway; nothing has moved yet.
    Pending,
    /// Funds were captured from the customer, but the driver transfer failed. Recovered out-of-band via
    /// `retry_transfer`. This state is an operational alert, not a terminal status.
    CapturedAwaitingTransfer,
    /// Capture and driver transfer both succeeded; the settlement is recorded.
    Confirmed,
    /// The payment was refunded as part of trip cancellation.
    Cancelled,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::CapturedAwaitingTransfer => write!(f, "CapturedAwaitingTransfer"),
            PaymentStatus::Confirmed => write!(f, "Confirmed"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "CapturedAwaitingTransfer" => Ok(Self::CapturedAwaitingTransfer),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------    AccountStatus     --------------------------------------------------------
/// Verification status of a driver account, as reported by the verification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AccountStatus {
    Pending,
    Processing,
    Verified,
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Pending => write!(f, "Pending"),
            AccountStatus::Processing => write!(f, "Processing"),
            AccountStatus::Verified => write!(f, "Verified"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Verified" => Ok(Self::Verified),
            s => Err(ConversionError(format!("Invalid account status: {s}"))),
        }
    }
}

impl From<String> for AccountStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid account status: {value}. But this conversion cannot fail. Defaulting to Pending");
            AccountStatus::Pending
        })
    }
}

//--------------------------------------         Trip         --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Trip {
    pub id: i64,
    pub trip_id: TripId,
    pub customer_id: String,
    pub truck_id: String,
    pub assigned_driver_id: Option<String>,
    pub trip_status: TripStatus,
    /// Fixed at creation. Settlement computes its shares from this value; it never rewrites it.
    pub total_cost: Money,
    pub cancellation_reason: Option<String>,
    pub tags: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewTrip        --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub trip_id: TripId,
    pub customer_id: String,
    pub truck_id: String,
    pub total_cost: Money,
    /// Freeform labels for searching trips. Must be non-empty at creation.
    pub tags: Vec<String>,
}

impl NewTrip {
    pub fn new<S1: Into<String>, S2: Into<String>>(customer_id: S1, truck_id: S2, total_cost: Money) -> Self {
        Self {
            trip_id: TripId::random(),
            customer_id: customer_id.into(),
            truck_id: truck_id.into(),
            total_cost,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I: IntoIterator<Item = String>>(mut self, tags: I) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }
}

//-------------------------------------- DriverTripApplication ------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DriverTripApplication {
    pub id: i64,
    pub trip_id: TripId,
    pub driver_id: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Payment        --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    /// The gateway's payment-intent reference. Unique; one intent per payment row.
    pub payment_intent_id: String,
    pub trip_id: TripId,
    pub customer_id: String,
    pub driver_id: String,
    /// The authorized total. Set once at authorization and never changed.
    pub amount: Money,
    /// The platform's cut, computed at authorization time from the fee-rate constant.
    pub application_fee: Money,
    pub payment_method_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// The driver's payout share: everything that is not the platform fee.
    pub fn driver_share(&self) -> Money {
        self.amount - self.application_fee
    }
}

//--------------------------------------      NewPayment      --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_intent_id: String,
    pub trip_id: TripId,
    pub customer_id: String,
    pub driver_id: String,
    pub amount: Money,
    pub application_fee: Money,
    pub payment_method_id: String,
}

//--------------------------------------        Driver        --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub account_status: AccountStatus,
    /// The connected payout account at the gateway. Required before a capture can transfer the driver share.
    pub payout_account_id: Option<String>,
    /// Cumulative payout ledger. Only ever incremented, and only by a successful capture+transfer.
    pub total_earnings: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDriver {
    pub id: String,
    pub name: String,
    pub account_status: AccountStatus,
    pub payout_account_id: Option<String>,
}

//--------------------------------------       Customer       --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    /// The gateway customer reference. `None` means the customer has no registered payment profile, which
    /// blocks trip creation and authorization.
    pub gateway_customer_id: Option<String>,
    pub default_payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub id: String,
    pub name: String,
    pub email: String,
}

//--------------------------------------        Truck         --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Truck {
    pub id: String,
    pub registration: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTruck {
    pub id: String,
    pub registration: String,
}
