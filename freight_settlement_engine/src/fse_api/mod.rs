pub mod errors;
pub mod matching_api;
pub mod payment_objects;
pub mod settlement_api;
pub mod trip_api;
pub mod trip_objects;
