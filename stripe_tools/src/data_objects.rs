//! Wire-format structs for the slice of Stripe's REST API the settlement engine uses, with conversions into
//! the engine's gateway objects.

use fse_common::Money;
use freight_settlement_engine::{
    Balance,
    CardSummary,
    GatewayCustomer,
    GatewayError,
    IntentStatus,
    PaymentIntent,
    Refund,
    Transfer,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<StripeCustomer> for GatewayCustomer {
    fn from(c: StripeCustomer) -> Self {
        Self { id: c.id, name: c.name.unwrap_or_default(), email: c.email.unwrap_or_default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub transfer_group: Option<String>,
}

impl TryFrom<StripePaymentIntent> for PaymentIntent {
    type Error = GatewayError;

    fn try_from(pi: StripePaymentIntent) -> Result<Self, Self::Error> {
        let status = match pi.status.as_str() {
            "processing" | "requires_confirmation" | "requires_action" => IntentStatus::Processing,
            "requires_capture" => IntentStatus::RequiresCapture,
            "succeeded" => IntentStatus::Succeeded,
            "canceled" => IntentStatus::Canceled,
            s => return Err(GatewayError::ResponseError(format!("Unexpected payment intent status: {s}"))),
        };
        Ok(Self {
            id: pi.id,
            amount: Money::from_minor(pi.amount),
            currency: pi.currency,
            status,
            transfer_group: pi.transfer_group,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeTransfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    #[serde(default)]
    pub transfer_group: Option<String>,
}

impl From<StripeTransfer> for Transfer {
    fn from(t: StripeTransfer) -> Self {
        Self {
            id: t.id,
            amount: Money::from_minor(t.amount),
            currency: t.currency,
            destination: t.destination,
            transfer_group: t.transfer_group,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub payment_intent: String,
    pub amount: i64,
}

impl From<StripeRefund> for Refund {
    fn from(r: StripeRefund) -> Self {
        Self { id: r.id, payment_intent_id: r.payment_intent, amount: Money::from_minor(r.amount) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCard {
    pub brand: String,
    pub last4: String,
    pub exp_month: i64,
    pub exp_year: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethod {
    pub id: String,
    #[serde(default)]
    pub card: Option<StripeCard>,
}

impl StripePaymentMethod {
    /// `None` for payment methods that are not cards.
    pub fn into_card_summary(self) -> Option<CardSummary> {
        self.card.map(|card| CardSummary {
            payment_method_id: self.id,
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        })
    }
}

/// Stripe wraps collection responses in a `data` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeBalanceFunds {
    pub amount: i64,
    pub currency: String,
}

/// Stripe reports balances per currency. The engine deals in a single currency, so the conversion sums the
/// entries.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeBalance {
    pub available: Vec<StripeBalanceFunds>,
    pub pending: Vec<StripeBalanceFunds>,
}

impl From<StripeBalance> for Balance {
    fn from(b: StripeBalance) -> Self {
        let sum = |funds: Vec<StripeBalanceFunds>| funds.into_iter().map(|f| Money::from_minor(f.amount)).sum();
        Self { available: sum(b.available), pending: sum(b.pending) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_intent_statuses_convert() {
        let pi = StripePaymentIntent {
            id: "pi_1".into(),
            amount: 10_000,
            currency: "usd".into(),
            status: "requires_capture".into(),
            transfer_group: Some("trip-abc".into()),
        };
        let intent = PaymentIntent::try_from(pi).unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresCapture);
        assert_eq!(intent.amount, Money::from_minor(10_000));
    }

    #[test]
    fn unknown_intent_status_is_a_response_error() {
        let pi = StripePaymentIntent {
            id: "pi_1".into(),
            amount: 10_000,
            currency: "usd".into(),
            status: "requires_payment_method".into(),
            transfer_group: None,
        };
        assert!(matches!(PaymentIntent::try_from(pi), Err(GatewayError::ResponseError(_))));
    }

    #[test]
    fn non_card_payment_methods_yield_no_card_summary() {
        let pm = StripePaymentMethod { id: "pm_1".into(), card: None };
        assert!(pm.into_card_summary().is_none());
    }
}
