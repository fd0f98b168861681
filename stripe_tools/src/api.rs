use std::{sync::Arc, time::Duration};

use fse_common::Money;
use freight_settlement_engine::{
    Balance,
    CardSummary,
    GatewayCustomer,
    GatewayError,
    NewPaymentIntent,
    NewTransfer,
    PaymentGateway,
    PaymentIntent,
    Refund,
    Transfer,
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    RequestBuilder,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::StripeConfig,
    data_objects::{
        StripeBalance,
        StripeCustomer,
        StripeList,
        StripePaymentIntent,
        StripePaymentMethod,
        StripeRefund,
        StripeTransfer,
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let response = req.send().await.map_err(|e| {
            // A timed-out money-moving call has an unknown outcome. It must never be retried blindly.
            if e.is_timeout() {
                GatewayError::UnknownOutcome(e.to_string())
            } else {
                GatewayError::RequestError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Stripe query successful. {}", response.status());
            return response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()));
        }
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| GatewayError::ResponseError(e.to_string()))?;
        Err(error_from_body(status, &body))
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending Stripe POST: {url}");
        self.execute(self.client.request(Method::POST, url).form(params)).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        account: Option<&str>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending Stripe GET: {url}");
        let mut req = self.client.request(Method::GET, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(account) = account {
            req = req.header("Stripe-Account", account);
        }
        self.execute(req).await
    }
}

/// Stripe wraps failures in an `error` envelope. Card declines get their own variant; everything else keeps
/// the status and message.
fn error_from_body(status: u16, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let error = &parsed["error"];
    let message = error["message"].as_str().unwrap_or(body).to_string();
    let is_decline =
        error["type"].as_str() == Some("card_error") || error["code"].as_str() == Some("card_declined");
    if is_decline {
        GatewayError::Declined(message)
    } else {
        GatewayError::QueryError { status, message }
    }
}

impl PaymentGateway for StripeApi {
    async fn create_customer(&self, name: &str, email: &str) -> Result<GatewayCustomer, GatewayError> {
        debug!("Creating Stripe customer for {email}");
        let params = [("name", name.to_string()), ("email", email.to_string())];
        let customer = self.post_form::<StripeCustomer>("/customers", &params).await?;
        info!("Created Stripe customer {}", customer.id);
        Ok(customer.into())
    }

    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), GatewayError> {
        let path = format!("/payment_methods/{payment_method_id}/attach");
        let params = [("customer", customer_id.to_string())];
        let _pm = self.post_form::<StripePaymentMethod>(&path, &params).await?;
        debug!("Attached payment method {payment_method_id} to customer {customer_id}");
        Ok(())
    }

    async fn set_default_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), GatewayError> {
        let path = format!("/customers/{customer_id}");
        let params = [("invoice_settings[default_payment_method]", payment_method_id.to_string())];
        let _customer = self.post_form::<StripeCustomer>(&path, &params).await?;
        debug!("Set default payment method for customer {customer_id}");
        Ok(())
    }

    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError> {
        debug!("Creating manual-capture intent of {} for {}", intent.amount, intent.transfer_group);
        let params = [
            ("amount", intent.amount.value().to_string()),
            ("currency", intent.currency),
            ("customer", intent.customer),
            ("payment_method", intent.payment_method),
            ("transfer_group", intent.transfer_group),
            ("capture_method", "manual".to_string()),
            ("confirm", "true".to_string()),
            ("off_session", "true".to_string()),
        ];
        let intent = self.post_form::<StripePaymentIntent>("/payment_intents", &params).await?;
        info!("Created payment intent {} ({})", intent.id, intent.status);
        intent.try_into()
    }

    async fn capture_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let path = format!("/payment_intents/{payment_intent_id}/capture");
        let intent = self.post_form::<StripePaymentIntent>(&path, &[]).await?;
        info!("Captured payment intent {payment_intent_id}");
        intent.try_into()
    }

    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let path = format!("/payment_intents/{payment_intent_id}/cancel");
        let intent = self.post_form::<StripePaymentIntent>(&path, &[]).await?;
        info!("Cancelled payment intent {payment_intent_id}");
        intent.try_into()
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> Result<Transfer, GatewayError> {
        debug!("Transferring {} to {} ({})", transfer.amount, transfer.destination, transfer.transfer_group);
        let params = [
            ("amount", transfer.amount.value().to_string()),
            ("currency", transfer.currency),
            ("destination", transfer.destination),
            ("transfer_group", transfer.transfer_group),
        ];
        let transfer = self.post_form::<StripeTransfer>("/transfers", &params).await?;
        info!("Created transfer {} to {}", transfer.id, transfer.destination);
        Ok(transfer.into())
    }

    async fn create_refund(&self, payment_intent_id: &str, amount: Option<Money>) -> Result<Refund, GatewayError> {
        let mut params = vec![("payment_intent", payment_intent_id.to_string())];
        if let Some(amount) = amount {
            params.push(("amount", amount.value().to_string()));
        }
        let refund = self.post_form::<StripeRefund>("/refunds", &params).await?;
        info!("Created refund {} on intent {payment_intent_id}", refund.id);
        Ok(refund.into())
    }

    async fn list_payment_methods(&self, customer_id: &str) -> Result<Vec<CardSummary>, GatewayError> {
        let path = format!("/customers/{customer_id}/payment_methods");
        let list = self.get_query::<StripeList<StripePaymentMethod>>(&path, &[("type", "card")], None).await?;
        Ok(list.data.into_iter().filter_map(StripePaymentMethod::into_card_summary).collect())
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let path = format!("/payment_intents/{payment_intent_id}");
        let intent = self.get_query::<StripePaymentIntent>(&path, &[], None).await?;
        intent.try_into()
    }

    async fn retrieve_balance(&self, account: Option<&str>) -> Result<Balance, GatewayError> {
        let balance = self.get_query::<StripeBalance>("/balance", &[], account).await?;
        Ok(balance.into())
    }
}
