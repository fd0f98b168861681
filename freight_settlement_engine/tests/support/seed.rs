//! Shared fixtures: a paying customer, two verified drivers and a truck.

use fse_common::Money;
use freight_settlement_engine::{
    db_types::{AccountStatus, NewCustomer, NewDriver, NewTruck, Trip},
    SettlementDatabase,
    SqliteDatabase,
};

pub const CUSTOMER_ID: &str = "cust-alice";
pub const DRIVER_ID: &str = "driver-bob";
pub const SECOND_DRIVER_ID: &str = "driver-carol";
pub const TRUCK_ID: &str = "truck-1";

/// Inserts the standard cast. The customer already has a saved payment profile; both drivers are verified and
/// `DRIVER_ID` has a payout account.
pub async fn seed_actors(db: &SqliteDatabase) {
    db.insert_customer(NewCustomer {
        id: CUSTOMER_ID.to_string(),
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
    })
    .await
    .expect("Error inserting customer");
    db.set_customer_gateway_profile(CUSTOMER_ID, "cus_seed", "pm_card_visa")
        .await
        .expect("Error setting gateway profile");
    db.insert_driver(NewDriver {
        id: DRIVER_ID.to_string(),
        name: "Bob".to_string(),
        account_status: AccountStatus::Verified,
        payout_account_id: Some("acct_bob".to_string()),
    })
    .await
    .expect("Error inserting driver");
    db.insert_driver(NewDriver {
        id: SECOND_DRIVER_ID.to_string(),
        name: "Carol".to_string(),
        account_status: AccountStatus::Verified,
        payout_account_id: Some("acct_carol".to_string()),
    })
    .await
    .expect("Error inserting second driver");
    db.insert_truck(NewTruck { id: TRUCK_ID.to_string(), registration: "CA 123-456".to_string() })
        .await
        .expect("Error inserting truck");
}

/// Creates a Pending trip for the seeded customer at the given cost (in major units).
pub async fn seed_trip(db: &SqliteDatabase, cost_major: i64) -> Trip {
    use freight_settlement_engine::db_types::NewTrip;
    let trip = NewTrip::new(CUSTOMER_ID, TRUCK_ID, Money::from_major(cost_major))
        .with_tags(vec!["flatbed".to_string(), "interstate".to_string()]);
    db.insert_trip(trip).await.expect("Error inserting trip")
}
