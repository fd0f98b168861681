mod payment_gateway;
pub(crate) mod settlement_database;

pub use payment_gateway::{
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
pub use settlement_database::{SettlementDatabase, StorageError};
