//! An in-memory payment gateway for driving the settlement flows in tests.
//!
//! The mock keeps a ledger of every intent, transfer and refund, counts every call, and can be told to fail
//! transfers or card listings to exercise the partial-failure paths.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use fse_common::Money;
use freight_settlement_engine::{
    Balance,
    CardSummary,
    GatewayCustomer,
    GatewayError,
    IntentStatus,
    NewPaymentIntent,
    NewTransfer,
    PaymentGateway,
    PaymentIntent,
    Refund,
    Transfer,
};

#[derive(Default)]
struct Inner {
    intents: HashMap<String, PaymentIntent>,
    transfers: Vec<Transfer>,
    refunds: Vec<Refund>,
    customer_seq: u64,
    intent_seq: u64,
    calls: u32,
    fail_transfers: bool,
    fail_card_listing: bool,
}

#[derive(Clone, Default)]
pub struct MockGateway {
    inner: Arc<Mutex<Inner>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of gateway calls made, successful or not.
    pub fn call_count(&self) -> u32 {
        self.inner.lock().unwrap().calls
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.inner.lock().unwrap().transfers.clone()
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.inner.lock().unwrap().refunds.clone()
    }

    pub fn intent(&self, id: &str) -> Option<PaymentIntent> {
        self.inner.lock().unwrap().intents.get(id).cloned()
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.inner.lock().unwrap().fail_transfers = fail;
    }

    pub fn set_fail_card_listing(&self, fail: bool) {
        self.inner.lock().unwrap().fail_card_listing = fail;
    }
}

impl PaymentGateway for MockGateway {
    async fn create_customer(&self, name: &str, email: &str) -> Result<GatewayCustomer, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        inner.customer_seq += 1;
        Ok(GatewayCustomer {
            id: format!("cus_{}", inner.customer_seq),
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    async fn attach_payment_method(&self, _customer_id: &str, _payment_method_id: &str) -> Result<(), GatewayError> {
        self.inner.lock().unwrap().calls += 1;
        Ok(())
    }

    async fn set_default_payment_method(
        &self,
        _customer_id: &str,
        _payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        self.inner.lock().unwrap().calls += 1;
        Ok(())
    }

    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        inner.intent_seq += 1;
        let intent = PaymentIntent {
            id: format!("pi_{}", inner.intent_seq),
            amount: intent.amount,
            currency: intent.currency,
            status: IntentStatus::RequiresCapture,
            transfer_group: Some(intent.transfer_group),
        };
        inner.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn capture_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let intent = inner
            .intents
            .get_mut(payment_intent_id)
            .ok_or_else(|| GatewayError::QueryError { status: 404, message: format!("No such intent: {payment_intent_id}") })?;
        if intent.status != IntentStatus::RequiresCapture {
            return Err(GatewayError::QueryError {
                status: 400,
                message: format!("Intent {payment_intent_id} is not capturable ({})", intent.status),
            });
        }
        intent.status = IntentStatus::Succeeded;
        Ok(intent.clone())
    }

    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let intent = inner
            .intents
            .get_mut(payment_intent_id)
            .ok_or_else(|| GatewayError::QueryError { status: 404, message: format!("No such intent: {payment_intent_id}") })?;
        intent.status = IntentStatus::Canceled;
        Ok(intent.clone())
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> Result<Transfer, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_transfers {
            return Err(GatewayError::QueryError { status: 503, message: "Transfers are down".to_string() });
        }
        let transfer = Transfer {
            id: format!("tr_{}", inner.transfers.len() + 1),
            amount: transfer.amount,
            currency: transfer.currency,
            destination: transfer.destination,
            transfer_group: Some(transfer.transfer_group),
        };
        inner.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_refund(&self, payment_intent_id: &str, amount: Option<Money>) -> Result<Refund, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let full_amount = inner
            .intents
            .get(payment_intent_id)
            .map(|i| i.amount)
            .ok_or_else(|| GatewayError::QueryError { status: 404, message: format!("No such intent: {payment_intent_id}") })?;
        let refund = Refund {
            id: format!("re_{}", inner.refunds.len() + 1),
            payment_intent_id: payment_intent_id.to_string(),
            amount: amount.unwrap_or(full_amount),
        };
        inner.refunds.push(refund.clone());
        Ok(refund)
    }

    async fn list_payment_methods(&self, _customer_id: &str) -> Result<Vec<CardSummary>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_card_listing {
            return Err(GatewayError::QueryError { status: 500, message: "Card listing is down".to_string() });
        }
        Ok(vec![CardSummary {
            payment_method_id: "pm_card_visa".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2030,
        }])
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        inner
            .intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::QueryError { status: 404, message: format!("No such intent: {payment_intent_id}") })
    }

    async fn retrieve_balance(&self, _account: Option<&str>) -> Result<Balance, GatewayError> {
        self.inner.lock().unwrap().calls += 1;
        Ok(Balance { available: Money::default(), pending: Money::default() })
    }
}
