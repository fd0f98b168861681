mod support;

use fse_common::Money;
use freight_settlement_engine::{
    db_types::{ApplicationStatus, PaymentStatus, Trip, TripStatus},
    payment_objects::AuthorizeRequest,
    ApiError,
    IntentStatus,
    MatchingApi,
    SettlementApi,
    SettlementDatabase,
    SqliteDatabase,
};
use support::*;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url).await.expect("Error creating database")
}

/// Seeds the cast, creates a trip at `cost_major`, and assigns `DRIVER_ID` to it.
async fn assigned_trip(db: &SqliteDatabase, cost_major: i64) -> Trip {
    seed_actors(db).await;
    let trip = seed_trip(db, cost_major).await;
    let matching = MatchingApi::new(db.clone());
    let app = matching.apply(&trip.trip_id, DRIVER_ID).await.unwrap();
    matching.assign(app.id, None).await.unwrap();
    db.fetch_trip(&trip.trip_id).await.unwrap().unwrap()
}

fn authorize_request(trip: &Trip) -> AuthorizeRequest {
    AuthorizeRequest {
        amount: trip.total_cost.to_major(),
        customer_id: CUSTOMER_ID.to_string(),
        driver_id: DRIVER_ID.to_string(),
        trip_id: trip.trip_id.clone(),
        payment_method_id: None,
    }
}

#[tokio::test]
async fn a_hundred_dollar_trip_splits_twenty_eighty_exactly() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db.clone(), gw.clone());

    let payment = api.authorize(authorize_request(&trip)).await.unwrap();
    // Exactly one gateway call per authorization: the intent creation.
    assert_eq!(gw.call_count(), 1);
    assert_eq!(payment.amount, Money::from_minor(10_000));
    assert_eq!(payment.application_fee, Money::from_minor(2_000));
    assert_eq!(payment.driver_share(), Money::from_minor(8_000));
    assert_eq!(payment.status, PaymentStatus::Pending);
    let confirmed = db.fetch_trip(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(confirmed.trip_status, TripStatus::Confirmed);

    let settled = api.capture(&trip.trip_id).await.unwrap();
    assert_eq!(settled.status, PaymentStatus::Confirmed);

    let transfers = gw.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, Money::from_minor(8_000));
    assert_eq!(transfers[0].destination, "acct_bob");

    let driver = db.fetch_driver(DRIVER_ID).await.unwrap().unwrap();
    assert_eq!(driver.total_earnings, Money::from_major(80));

    let completed = db.fetch_trip(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(completed.trip_status, TripStatus::Completed);
    let app = db.fetch_winning_application(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(app.status, ApplicationStatus::Completed);
}

#[tokio::test]
async fn invalid_amounts_cause_zero_gateway_calls() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw.clone());

    for amount in [f64::NAN, f64::INFINITY, -5.0, 0.0] {
        let mut req = authorize_request(&trip);
        req.amount = amount;
        let err = api.authorize(req).await.unwrap_err();
        assert_eq!(err.status_code(), 412, "{err}");
    }
    assert_eq!(gw.call_count(), 0);
}

#[tokio::test]
async fn authorization_requires_a_saved_payment_profile() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    sqlx::query("UPDATE customers SET gateway_customer_id = NULL, default_payment_method = NULL")
        .execute(db.pool())
        .await
        .unwrap();
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw.clone());
    let err = api.authorize(authorize_request(&trip)).await.unwrap_err();
    assert_eq!(err.status_code(), 412, "{err}");
    assert_eq!(gw.call_count(), 0);
}

#[tokio::test]
async fn a_second_authorization_for_the_same_trip_is_a_conflict() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw);
    api.authorize(authorize_request(&trip)).await.unwrap();
    let err = api.authorize(authorize_request(&trip)).await.unwrap_err();
    assert_eq!(err.status_code(), 409, "{err}");
}

#[tokio::test]
async fn authorization_rides_out_transient_write_conflicts() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    // The first two attempts to record the settlement collide; the third lands.
    let flaky = ConflictingDb::new(db.clone(), 2);
    let api = SettlementApi::new(flaky, gw.clone());

    let payment = api.authorize(authorize_request(&trip)).await.unwrap();
    // One intent on the gateway, one payment row locally, no duplicates from the retries.
    assert_eq!(gw.call_count(), 1);
    let payments = db.fetch_payments().await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment_intent_id, payment.payment_intent_id);
    let confirmed = db.fetch_trip(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(confirmed.trip_status, TripStatus::Confirmed);
}

#[tokio::test]
async fn conflict_exhaustion_leaves_the_hold_unrecorded() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    // Enough conflicts to burn every retry.
    let flaky = ConflictingDb::new(db.clone(), 3);
    let api = SettlementApi::new(flaky, gw.clone());

    let err = api.authorize(authorize_request(&trip)).await.unwrap_err();
    assert!(matches!(err, ApiError::SettlementNotRecorded(_)), "{err}");
    assert_eq!(err.status_code(), 500);
    // The gateway hold exists but nothing was recorded locally. Operators reconcile from here.
    assert_eq!(gw.call_count(), 1);
    assert!(db.fetch_payment_for_trip(&trip.trip_id).await.unwrap().is_none());
    let trip = db.fetch_trip(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(trip.trip_status, TripStatus::Assigned);
}

#[tokio::test]
async fn a_failed_transfer_flags_the_payment_and_is_recoverable() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db.clone(), gw.clone());
    let payment = api.authorize(authorize_request(&trip)).await.unwrap();

    gw.set_fail_transfers(true);
    let err = api.capture(&trip.trip_id).await.unwrap_err();
    assert_eq!(err.status_code(), 500, "{err}");

    // The capture stuck, the payout did not. Nothing may look settled.
    let flagged = db.fetch_payment_for_trip(&trip.trip_id).await.unwrap().unwrap();
    assert_eq!(flagged.status, PaymentStatus::CapturedAwaitingTransfer);
    let driver = db.fetch_driver(DRIVER_ID).await.unwrap().unwrap();
    assert_eq!(driver.total_earnings, Money::from_major(0));
    assert!(gw.transfers().is_empty());

    // A second capture must not re-capture the intent.
    let err = api.capture(&trip.trip_id).await.unwrap_err();
    assert_eq!(err.status_code(), 409, "{err}");

    gw.set_fail_transfers(false);
    let settled = api.retry_transfer(&payment.payment_intent_id).await.unwrap();
    assert_eq!(settled.status, PaymentStatus::Confirmed);
    let driver = db.fetch_driver(DRIVER_ID).await.unwrap().unwrap();
    assert_eq!(driver.total_earnings, Money::from_major(80));
    assert_eq!(gw.transfers().len(), 1);
}

#[tokio::test]
async fn retry_transfer_only_applies_to_flagged_payments() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw);
    let payment = api.authorize(authorize_request(&trip)).await.unwrap();
    let err = api.retry_transfer(&payment.payment_intent_id).await.unwrap_err();
    assert_eq!(err.status_code(), 409, "{err}");
}

#[tokio::test]
async fn card_metadata_degrades_gracefully_when_the_gateway_is_down() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw.clone());
    let payment = api.authorize(authorize_request(&trip)).await.unwrap();

    let detail = api.payment(payment.id).await.unwrap();
    assert_eq!(detail.card.as_ref().map(|c| c.payment_method_id.as_str()), Some("pm_card_visa"));

    gw.set_fail_card_listing(true);
    let detail = api.payment(payment.id).await.unwrap();
    assert!(detail.card.is_none());
    assert_eq!(detail.payment.payment_intent_id, payment.payment_intent_id);
}

#[tokio::test]
async fn reconciliation_tracks_the_escrow_state_machine() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw);
    api.authorize(authorize_request(&trip)).await.unwrap();

    let report = api.reconcile(&trip.trip_id).await.unwrap();
    assert!(report.consistent);
    assert_eq!(report.local_status, PaymentStatus::Pending);
    assert_eq!(report.gateway_status, IntentStatus::RequiresCapture);

    api.capture(&trip.trip_id).await.unwrap();
    let report = api.reconcile(&trip.trip_id).await.unwrap();
    assert!(report.consistent);
    assert_eq!(report.local_status, PaymentStatus::Confirmed);
    assert_eq!(report.gateway_status, IntentStatus::Succeeded);
}

#[tokio::test]
async fn payment_summary_counts_confirmed_volume() {
    let db = new_db().await;
    let trip = assigned_trip(&db, 100).await;
    let gw = MockGateway::new();
    let api = SettlementApi::new(db, gw);
    api.authorize(authorize_request(&trip)).await.unwrap();
    api.capture(&trip.trip_id).await.unwrap();

    let summary = api.payment_summary().await.unwrap();
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.confirmed_volume, Money::from_major(100));
    assert_eq!(summary.confirmed_fees, Money::from_minor(2_000));

    let recent = api.payments_for_last_months(1).await.unwrap();
    assert_eq!(recent.len(), 1);
}
