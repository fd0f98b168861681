use thiserror::Error;

use crate::{db_types::TripId, GatewayError, StorageError};

/// The error surface of the public APIs.
///
/// Every variant maps to an HTTP-equivalent status code via [`ApiError::status_code`], and every message is
/// safe to show to a caller: no stack traces, no internal identifiers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The requested record was not found. {0}")]
    NotFound(String),
    #[error("The request conflicts with existing state. {0}")]
    Conflict(String),
    #[error("A precondition for this operation failed. {0}")]
    PreconditionFailed(String),
    #[error("The payment processor reported an error. {0}")]
    Gateway(#[from] GatewayError),
    /// Funds have moved at the gateway but the local settlement record could not be written, even after
    /// retries. This is NOT a domain error: the caller's request succeeded remotely and the trip must be
    /// reconciled.
    #[error("The payment succeeded but the settlement could not be recorded. Reconcile trip {0}.")]
    SettlementNotRecorded(TripId),
    /// Funds were captured from the customer but the driver payout failed. The payment is flagged and waits
    /// for an out-of-band transfer retry. Surfacing this as an error is deliberate; it must never look like a
    /// completed settlement.
    #[error("The payment was captured but the driver payout failed. Payment {0} requires operator attention.")]
    CaptureIncomplete(String),
    #[error("An internal storage error occurred.")]
    Storage(#[source] StorageError),
}

impl ApiError {
    /// The HTTP-equivalent status code for this error. The engine exposes no HTTP surface itself; this is the
    /// contract with whatever controller layer sits above it.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PreconditionFailed(_) => 412,
            ApiError::Gateway(_) => 502,
            ApiError::SettlementNotRecorded(_) => 500,
            ApiError::CaptureIncomplete(_) => 500,
            ApiError::Storage(_) => 500,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        use StorageError::*;
        match e {
            TripNotFound(id) => ApiError::NotFound(format!("Trip {id} does not exist")),
            ApplicationNotFound(_) => ApiError::NotFound("Driver trip application not found".to_string()),
            PaymentNotFound(_) => ApiError::NotFound("No payment found for this trip".to_string()),
            DriverNotFound(id) => ApiError::NotFound(format!("Driver {id} does not exist")),
            CustomerNotFound(_) => {
                ApiError::NotFound("Update your profile information first to create trips".to_string())
            },
            TruckNotFound(id) => ApiError::NotFound(format!("Truck {id} does not exist")),
            NoWinningApplication(id) => ApiError::NotFound(format!("Trip {id} has no assigned driver")),
            DuplicateApplication(..) => ApiError::Conflict("Already applied for this trip".to_string()),
            DuplicatePaymentForTrip(id) => ApiError::Conflict(format!("A payment already exists for trip {id}")),
            TripHasPayment(id) => {
                ApiError::Conflict(format!("Trip {id} has a payment record and can only be cancelled"))
            },
            e @ (Backend(_) | TransientConflict) => ApiError::Storage(e),
        }
    }
}
