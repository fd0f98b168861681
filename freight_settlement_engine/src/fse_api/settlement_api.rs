use chrono::{DateTime, Months, Utc};
use fse_common::{Money, USD_CURRENCY_CODE};
use log::{debug, error, info, warn};

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus, Trip, TripId, TripStatus},
    fse_api::{
        errors::ApiError,
        payment_objects::{AuthorizeRequest, PaymentDetail, PaymentSummary, ReconciliationReport, SaveCardRequest,
            SavedCard},
    },
    helpers::{retry_on_conflict, MAX_CONFLICT_RETRIES},
    IntentStatus,
    NewPaymentIntent,
    NewTransfer,
    PaymentGateway,
    Refund,
    SettlementDatabase,
    StorageError,
};

/// The platform's cut of every settled trip, as an integer percentage of the authorized amount.
pub const PLATFORM_FEE_PERCENT: i64 = 20;

/// The payment settlement flow: escrow-style authorize, capture-and-split, and penalty refunds.
///
/// Every operation follows the same discipline: the gateway call happens first and exactly once, then the
/// local milestone is recorded in a single store transaction, retried only on transient conflicts. The
/// gateway call is never inside the retry loop.
pub struct SettlementApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> SettlementApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    //----------------------------------------- Card setup -----------------------------------------------------
    /// Registers the customer with the gateway (once), attaches the tokenized card, makes it their default,
    /// and stores the gateway profile locally. Without this profile, trip creation and authorization are
    /// blocked.
    pub async fn save_card(&self, customer_id: &str, req: SaveCardRequest) -> Result<SavedCard, ApiError> {
        let customer = self
            .db
            .fetch_customer(customer_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Customer {customer_id} does not exist")))?;
        let gateway_customer_id = match customer.gateway_customer_id {
            Some(id) => id,
            None => self.gateway.create_customer(&req.name, &req.email).await?.id,
        };
        self.gateway.attach_payment_method(&gateway_customer_id, &req.payment_method_id).await?;
        self.gateway.set_default_payment_method(&gateway_customer_id, &req.payment_method_id).await?;
        self.db
            .set_customer_gateway_profile(customer_id, &gateway_customer_id, &req.payment_method_id)
            .await?;
        info!("💳️ Customer {customer_id} saved card {} with the gateway", req.payment_method_id);
        Ok(SavedCard { gateway_customer_id, payment_method_id: req.payment_method_id })
    }

    //----------------------------------------- Authorize ------------------------------------------------------
    /// Places a hold on the customer's card for the trip's full cost and records the Pending payment,
    /// confirming the trip in the same store transaction.
    ///
    /// The amount is validated *before* the gateway is touched: a malformed or non-positive amount must cause
    /// zero gateway calls. If the local write conflicts transiently on all attempts, the hold exists at the
    /// gateway but not locally, and the caller gets [`ApiError::SettlementNotRecorded`].
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<Payment, ApiError> {
        let amount = Money::from_major_f64(req.amount)
            .map_err(|e| ApiError::PreconditionFailed(format!("Invalid payment amount: {e}")))?;
        if !amount.is_positive() {
            return Err(ApiError::PreconditionFailed(format!("Payment amount must be positive, not {amount}")));
        }
        let customer = self
            .db
            .fetch_customer(&req.customer_id)
            .await?
            .ok_or(StorageError::CustomerNotFound(req.customer_id.clone()))?;
        let gateway_customer_id = customer.gateway_customer_id.ok_or_else(|| {
            ApiError::PreconditionFailed(format!("Customer {} has no saved payment profile", req.customer_id))
        })?;
        let payment_method = req
            .payment_method_id
            .or(customer.default_payment_method)
            .ok_or_else(|| {
                ApiError::PreconditionFailed(format!("Customer {} has no default payment method", req.customer_id))
            })?;
        let trip = self
            .db
            .fetch_trip(&req.trip_id)
            .await?
            .ok_or(StorageError::TripNotFound(req.trip_id.clone()))?;
        if trip.trip_status != TripStatus::Assigned {
            return Err(ApiError::Conflict(format!(
                "Trip {} cannot be authorized from status {}",
                req.trip_id, trip.trip_status
            )));
        }
        if self.db.fetch_driver(&req.driver_id).await?.is_none() {
            return Err(StorageError::DriverNotFound(req.driver_id.clone()).into());
        }
        // Gateway first. From here on, money is on hold remotely.
        let intent = self
            .gateway
            .create_payment_intent(NewPaymentIntent {
                amount,
                currency: USD_CURRENCY_CODE.to_string(),
                customer: gateway_customer_id,
                payment_method: payment_method.clone(),
                transfer_group: transfer_group(&req.trip_id),
            })
            .await?;
        info!("💳️ Authorized {amount} for trip {} (intent {})", req.trip_id, intent.id);
        let application_fee = amount.percent(PLATFORM_FEE_PERCENT);
        let new_payment = NewPayment {
            payment_intent_id: intent.id,
            trip_id: req.trip_id.clone(),
            customer_id: req.customer_id,
            driver_id: req.driver_id,
            amount,
            application_fee,
            payment_method_id: payment_method,
        };
        let result = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
            self.db.insert_payment_and_confirm_trip(new_payment.clone())
        })
        .await;
        match result {
            Ok(payment) => Ok(payment),
            Err(StorageError::TransientConflict) => {
                error!(
                    "💳️ The hold for trip {} exists at the gateway but could not be recorded locally",
                    req.trip_id
                );
                Err(ApiError::SettlementNotRecorded(req.trip_id))
            },
            Err(e) => Err(e.into()),
        }
    }

    //------------------------------------------ Capture -------------------------------------------------------
    /// Settles a confirmed trip: captures the held funds, transfers the driver's share to their payout
    /// account, and records the settlement (payment Confirmed, earnings incremented, trip Completed) in one
    /// store transaction.
    ///
    /// A failed transfer after a successful capture leaves the payment in CapturedAwaitingTransfer and
    /// surfaces as [`ApiError::CaptureIncomplete`]; the driver share is paid later via [`Self::retry_transfer`].
    pub async fn capture(&self, trip_id: &TripId) -> Result<Payment, ApiError> {
        let payment = self
            .db
            .fetch_payment_for_trip(trip_id)
            .await?
            .ok_or(StorageError::PaymentNotFound(trip_id.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "Payment {} cannot be captured from status {}",
                payment.payment_intent_id, payment.status
            )));
        }
        let payout_account = self.driver_payout_account(&payment.driver_id).await?;
        self.gateway.capture_payment_intent(&payment.payment_intent_id).await?;
        info!("💳️ Captured {} for trip {trip_id} (intent {})", payment.amount, payment.payment_intent_id);
        let driver_share = payment.driver_share();
        let transfer = self
            .gateway
            .create_transfer(NewTransfer {
                amount: driver_share,
                currency: USD_CURRENCY_CODE.to_string(),
                destination: payout_account,
                transfer_group: transfer_group(trip_id),
            })
            .await;
        if let Err(e) = transfer {
            warn!(
                "💳️ Captured intent {} but the driver transfer failed: {e}. Flagging for out-of-band retry.",
                payment.payment_intent_id
            );
            let flagged = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
                self.db.mark_payment_captured(&payment.payment_intent_id)
            })
            .await;
            if let Err(e) = flagged {
                error!("💳️ Could not flag captured payment {}: {e}", payment.payment_intent_id);
            }
            return Err(ApiError::CaptureIncomplete(payment.payment_intent_id));
        }
        self.settle(&payment.payment_intent_id, trip_id, driver_share).await
    }

    /// Re-attempts the driver payout for a payment stuck in CapturedAwaitingTransfer, then records the full
    /// settlement. The capture is NOT repeated; the funds already moved to the platform.
    pub async fn retry_transfer(&self, payment_intent_id: &str) -> Result<Payment, ApiError> {
        let payment = self
            .db
            .fetch_payment_by_intent_id(payment_intent_id)
            .await?
            .ok_or(StorageError::PaymentNotFound(payment_intent_id.to_string()))?;
        if payment.status != PaymentStatus::CapturedAwaitingTransfer {
            return Err(ApiError::Conflict(format!(
                "Payment {payment_intent_id} is not awaiting a transfer (status: {})",
                payment.status
            )));
        }
        let payout_account = self.driver_payout_account(&payment.driver_id).await?;
        let driver_share = payment.driver_share();
        self.gateway
            .create_transfer(NewTransfer {
                amount: driver_share,
                currency: USD_CURRENCY_CODE.to_string(),
                destination: payout_account,
                transfer_group: transfer_group(&payment.trip_id),
            })
            .await?;
        self.settle(payment_intent_id, &payment.trip_id, driver_share).await
    }

    async fn settle(&self, payment_intent_id: &str, trip_id: &TripId, driver_share: Money) -> Result<Payment, ApiError> {
        let result =
            retry_on_conflict(MAX_CONFLICT_RETRIES, || self.db.settle_payment(payment_intent_id, driver_share)).await;
        match result {
            Ok(payment) => {
                info!(
                    "💳️ Settled trip {trip_id}: {driver_share} transferred to driver {} (intent {payment_intent_id})",
                    payment.driver_id
                );
                Ok(payment)
            },
            Err(StorageError::TransientConflict) => {
                error!("💳️ Funds moved for trip {trip_id} but the settlement could not be recorded locally");
                Err(ApiError::SettlementNotRecorded(trip_id.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn driver_payout_account(&self, driver_id: &str) -> Result<String, ApiError> {
        let driver = self
            .db
            .fetch_driver(driver_id)
            .await?
            .ok_or(StorageError::DriverNotFound(driver_id.to_string()))?;
        driver.payout_account_id.ok_or_else(|| {
            ApiError::PreconditionFailed(format!("Driver {driver_id} has no payout account configured"))
        })
    }

    //------------------------------------------ Refunds -------------------------------------------------------
    /// Returns all (`None`) or part of a charge to the payer. This is a pure gateway operation; the local
    /// record is adjusted by the caller's milestone (e.g. [`Self::cancel_with_penalty`]).
    pub async fn refund(&self, payment_intent_id: &str, amount: Option<Money>) -> Result<Refund, ApiError> {
        let refund = self.gateway.create_refund(payment_intent_id, amount).await?;
        info!("💳️ Refunded {} on intent {payment_intent_id}", refund.amount);
        Ok(refund)
    }

    /// The penalty path for a customer cancelling a trip whose funds are already on hold: the hold is
    /// captured in full and 80% of the trip cost is returned, leaving the 20% cancellation penalty with the
    /// platform. The payment, trip and winning application are all cancelled in one store transaction.
    pub async fn cancel_with_penalty(&self, trip: &Trip, reason: &str) -> Result<Payment, ApiError> {
        let payment = self
            .db
            .fetch_payment_for_trip(&trip.trip_id)
            .await?
            .ok_or(StorageError::PaymentNotFound(trip.trip_id.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "Payment {} cannot be penalty-cancelled from status {}",
                payment.payment_intent_id, payment.status
            )));
        }
        self.gateway.capture_payment_intent(&payment.payment_intent_id).await?;
        let refund_amount = trip.total_cost.percent(80);
        self.gateway.create_refund(&payment.payment_intent_id, Some(refund_amount)).await?;
        info!(
            "💳️ Penalty cancellation of trip {}: captured {} and refunded {refund_amount}. Reason: {reason}",
            trip.trip_id, trip.total_cost
        );
        let reason = reason.to_string();
        let result = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
            self.db.cancel_payment_and_trip(&payment.payment_intent_id, &reason)
        })
        .await;
        match result {
            Ok(payment) => Ok(payment),
            Err(StorageError::TransientConflict) => {
                error!(
                    "💳️ The penalty for trip {} was applied at the gateway but could not be recorded locally",
                    trip.trip_id
                );
                Err(ApiError::SettlementNotRecorded(trip.trip_id.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    //--------------------------------------- Reconciliation ---------------------------------------------------
    /// Compares the local payment record for a trip against the gateway's view of its intent. The two systems
    /// share no transaction boundary, so divergence is possible after a crash between a gateway call and the
    /// local commit; this read is how operators find those windows.
    pub async fn reconcile(&self, trip_id: &TripId) -> Result<ReconciliationReport, ApiError> {
        let payment = self
            .db
            .fetch_payment_for_trip(trip_id)
            .await?
            .ok_or(StorageError::PaymentNotFound(trip_id.to_string()))?;
        let intent = self.gateway.retrieve_payment_intent(&payment.payment_intent_id).await?;
        let consistent = match (payment.status, intent.status) {
            (PaymentStatus::Pending, IntentStatus::RequiresCapture) => true,
            (PaymentStatus::Confirmed, IntentStatus::Succeeded) => true,
            (PaymentStatus::CapturedAwaitingTransfer, IntentStatus::Succeeded) => true,
            // A penalty cancellation captures then refunds, so the intent reads Succeeded. A plain release of
            // the hold reads Canceled. Both are consistent with a cancelled payment.
            (PaymentStatus::Cancelled, IntentStatus::Succeeded | IntentStatus::Canceled) => true,
            _ => false,
        };
        if !consistent {
            warn!(
                "💳️ Trip {trip_id} is inconsistent: local payment is {} but the gateway reports {}",
                payment.status, intent.status
            );
        }
        Ok(ReconciliationReport {
            payment_intent_id: payment.payment_intent_id,
            trip_id: trip_id.clone(),
            local_status: payment.status,
            gateway_status: intent.status,
            consistent,
        })
    }

    //------------------------------------------- Reads --------------------------------------------------------
    pub async fn payments(&self) -> Result<Vec<Payment>, ApiError> {
        Ok(self.db.fetch_payments().await?)
    }

    /// A single payment with the card metadata for its payment method. The card block degrades gracefully: a
    /// gateway failure while listing cards logs a warning and returns the payment without card details.
    pub async fn payment(&self, id: i64) -> Result<PaymentDetail, ApiError> {
        let payment = self
            .db
            .fetch_payment(id)
            .await?
            .ok_or(StorageError::PaymentNotFound(id.to_string()))?;
        let customer = self.db.fetch_customer(&payment.customer_id).await?;
        let card = match customer.and_then(|c| c.gateway_customer_id) {
            Some(gateway_customer_id) => match self.gateway.list_payment_methods(&gateway_customer_id).await {
                Ok(cards) => cards.into_iter().find(|c| c.payment_method_id == payment.payment_method_id),
                Err(e) => {
                    warn!("💳️ Could not fetch card metadata for payment {id}: {e}");
                    None
                },
            },
            None => None,
        };
        debug!("💳️ Fetched payment {id} (intent {})", payment.payment_intent_id);
        Ok(PaymentDetail { payment, card })
    }

    pub async fn payment_summary(&self) -> Result<PaymentSummary, ApiError> {
        Ok(self.db.payment_summary().await?)
    }

    /// Payments created in the last `months` calendar months, newest first.
    pub async fn payments_for_last_months(&self, months: u32) -> Result<Vec<Payment>, ApiError> {
        let since = Utc::now().checked_sub_months(Months::new(months)).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.db.payments_since(since).await?)
    }
}

/// The correlation tag linking a trip's charge and its driver transfer at the gateway.
pub(crate) fn transfer_group(trip_id: &TripId) -> String {
    format!("trip-{}", trip_id.as_str())
}
