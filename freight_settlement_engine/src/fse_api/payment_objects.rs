use fse_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Payment, PaymentStatus, TripId},
    CardSummary,
    IntentStatus,
};

//--------------------------------------   SaveCardRequest    --------------------------------------------------------
/// Registers a customer with the payment processor and saves a tokenized card as their default method.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveCardRequest {
    pub name: String,
    pub email: String,
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedCard {
    pub gateway_customer_id: String,
    pub payment_method_id: String,
}

//--------------------------------------  AuthorizeRequest    --------------------------------------------------------
/// A request to place a hold on the customer's saved card for a trip.
///
/// The amount is in major units (dollars), as supplied by the caller; it is validated and converted to minor
/// units before anything touches the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub amount: f64,
    pub customer_id: String,
    pub driver_id: String,
    pub trip_id: TripId,
    /// Defaults to the customer's stored default payment method.
    pub payment_method_id: Option<String>,
}

//--------------------------------------    PaymentDetail     --------------------------------------------------------
/// A payment read projection, with the customer's default card metadata denormalized from the gateway.
///
/// The card block is best-effort: a gateway failure while fetching card metadata must not fail the read.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetail {
    pub payment: Payment,
    pub card: Option<CardSummary>,
}

//--------------------------------------    PaymentSummary    --------------------------------------------------------
/// Aggregate payment counts by status, plus the settled volume and collected fees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub pending: i64,
    pub awaiting_transfer: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub total: i64,
    pub confirmed_volume: Money,
    pub confirmed_fees: Money,
}

//-------------------------------------- ReconciliationReport -------------------------------------------------------
/// The result of comparing a local payment record against the gateway's view of the same intent.
///
/// The two systems share no transaction boundary, so a crash between a gateway call and the local commit
/// leaves them divergent. This report is how that window is detected.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub payment_intent_id: String,
    pub trip_id: TripId,
    pub local_status: PaymentStatus,
    pub gateway_status: IntentStatus,
    pub consistent: bool,
}
