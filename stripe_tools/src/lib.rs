//! A thin Stripe client implementing the settlement engine's [`PaymentGateway`] contract.
//!
//! Only the slice of Stripe's surface the settlement flows need is covered: customers, payment methods,
//! manual-capture payment intents, transfers to connected accounts, refunds and balances.
//!
//! [`PaymentGateway`]: freight_settlement_engine::PaymentGateway

mod api;
mod config;
mod data_objects;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    StripeBalance,
    StripeCustomer,
    StripePaymentIntent,
    StripePaymentMethod,
    StripeRefund,
    StripeTransfer,
};
