use std::fmt::Display;

use fse_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The contract with the third-party payment processor.
///
/// The processor is a remote, at-least-once service with its own internal consistency and no shared
/// transaction boundary with the local store. Callers must treat every mutation here as money-moving:
/// * a gateway call is made at most once per settlement milestone — never inside a retry loop,
/// * a timed-out call has an *unknown* outcome and surfaces as [`GatewayError::UnknownOutcome`]; it is a
///   fatal error, not a retryable one, because re-issuing it could double-charge or double-transfer.
///
/// All amounts are in minor currency units, which is what [`Money::value`] holds.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Registers a customer with the processor, returning the processor's customer reference.
    async fn create_customer(&self, name: &str, email: &str) -> Result<GatewayCustomer, GatewayError>;

    /// Attaches a tokenized payment method to a gateway customer.
    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), GatewayError>;

    /// Makes the payment method the customer's default for off-session charges.
    async fn set_default_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), GatewayError>;

    /// Places a hold on the customer's funds without moving them (manual capture mode). The intent carries a
    /// transfer group so the later split-transfer can be correlated back to this charge.
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError>;

    /// Converts a hold into an actual funds movement to the platform.
    async fn capture_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Releases a hold that has not been captured.
    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Moves previously captured platform funds onward to a connected payout account.
    async fn create_transfer(&self, transfer: NewTransfer) -> Result<Transfer, GatewayError>;

    /// Returns all or part of a captured or held charge to the payer. `None` refunds the full amount.
    async fn create_refund(&self, payment_intent_id: &str, amount: Option<Money>) -> Result<Refund, GatewayError>;

    /// Lists the card payment methods saved against a gateway customer.
    async fn list_payment_methods(&self, customer_id: &str) -> Result<Vec<CardSummary>, GatewayError>;

    /// Retrieves the intent as the processor sees it. This is the reconciliation read.
    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// The balance of the platform account, or of a connected account when one is given.
    async fn retrieve_balance(&self, account: Option<&str>) -> Result<Balance, GatewayError>;
}

//--------------------------------------   GatewayCustomer    --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
    pub name: String,
    pub email: String,
}

//--------------------------------------     IntentStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Processing => write!(f, "processing"),
            IntentStatus::RequiresCapture => write!(f, "requires_capture"),
            IntentStatus::Succeeded => write!(f, "succeeded"),
            IntentStatus::Canceled => write!(f, "canceled"),
        }
    }
}

//--------------------------------------    PaymentIntent     --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub status: IntentStatus,
    pub transfer_group: Option<String>,
}

//--------------------------------------  NewPaymentIntent    --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: Money,
    pub currency: String,
    pub customer: String,
    pub payment_method: String,
    pub transfer_group: String,
}

//--------------------------------------      Transfer        --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub destination: String,
    pub transfer_group: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub amount: Money,
    pub currency: String,
    pub destination: String,
    pub transfer_group: String,
}

//--------------------------------------       Refund         --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub payment_intent_id: String,
    pub amount: Money,
}

//--------------------------------------     CardSummary      --------------------------------------------------------
/// Display metadata for a saved card. Never holds the full card number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSummary {
    pub payment_method_id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: i64,
    pub exp_year: i64,
}

//--------------------------------------       Balance        --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub available: Money,
    pub pending: Money,
}

//--------------------------------------     GatewayError     --------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("Invalid gateway request: {0}")]
    RequestError(String),
    #[error("Invalid gateway response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize gateway response: {0}")]
    JsonError(String),
    #[error("Gateway call failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway call timed out and its outcome is unknown. Do not retry: {0}")]
    UnknownOutcome(String),
    #[error("The gateway declined the operation: {0}")]
    Declined(String),
}
