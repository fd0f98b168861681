//! Freight Settlement Engine
//!
//! The core library for a freight marketplace that connects shippers with truck drivers and settles trips
//! through an escrowed payment flow (authorize → capture-and-split → refund).
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public APIs instead. The exception is the data types used in the
//!    database, which are defined in [`db_types`] and are public.
//! 2. The backend traits ([`SettlementDatabase`] and [`PaymentGateway`]). The local store and the remote
//!    payment processor are both injected through these seams, so every API can run against fakes in tests.
//! 3. The public APIs ([`TripApi`], [`MatchingApi`] and [`SettlementApi`]). These own the trip state machine,
//!    the single-winner driver assignment and the escrow state machine respectively.
//!
//! The store and the gateway share no transaction boundary. Every settlement milestone therefore follows the
//! same protocol: gateway call first, local transaction second, with the local write retried on transient
//! conflicts (never the gateway call). A crash between the two steps leaves funds moved and local state stale;
//! [`SettlementApi::reconcile`] is the read path that detects that window.
mod db;

pub mod db_types;
mod fse_api;
pub mod helpers;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{
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
    SettlementDatabase,
    StorageError,
    Transfer,
};
pub use fse_api::{
    errors::ApiError,
    matching_api::MatchingApi,
    payment_objects,
    settlement_api::{SettlementApi, PLATFORM_FEE_PERCENT},
    trip_api::{TripApi, DEFAULT_CANCELLATION_REASON},
    trip_objects,
};
