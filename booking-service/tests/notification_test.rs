mod common;

use axum::http::StatusCode;
use booking_service::models::{BookingStatus, TransactionStatus};
use booking_service::services::BookingStore;
use common::{days_from_today, signed_notification, TestApp, TestOptions};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

const WEBHOOK: &str = "/api/payments/notification";

#[tokio::test]
async fn settlement_creates_booking_and_purchase() {
    let app = TestApp::spawn();
    let user = Uuid::new_v4();
    app.seed_transaction(
        "TRV-3001",
        Some(user),
        Some(42),
        Some(json!([{ "id": "DEST-42", "name": "Bromo", "price": 75000, "quantity": 2 }])),
        Some(days_from_today(14)),
    )
    .await;

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3001", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["message"], "Transaction notification processed");
    assert_eq!(response.body["status"], "success");

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Success);
    assert_eq!(tx.payment_type.as_deref(), Some("bank_transfer"));

    let bookings = app.store.bookings();
    assert_eq!(bookings.len(), 1);
    let booking = &bookings[0];
    assert_eq!(booking.order_id.as_deref(), Some("TRV-3001"));
    assert_eq!(booking.user_id, user);
    assert_eq!(booking.destination_id, 42);
    assert_eq!(booking.visit_date, days_from_today(14));
    assert_eq!(booking.quantity, 2);
    assert_eq!(booking.total_price, Decimal::new(150_000, 0));
    assert_eq!(booking.status(), Some(BookingStatus::Confirmed));

    let purchases = app.store.purchases();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].booking_id, Some(booking.id));
    assert_eq!(purchases[0].payment_method.as_deref(), Some("bank_transfer"));
}

#[tokio::test]
async fn duplicate_delivery_is_idempotent() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3002", Some(Uuid::new_v4()), Some(7), None, Some(days_from_today(3)))
        .await;

    for _ in 0..3 {
        let response = app
            .post_json(WEBHOOK, None, signed_notification("TRV-3002", "settlement"))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "success");
    }

    assert_eq!(app.store.bookings().len(), 1);
    assert_eq!(app.store.purchases().len(), 1);
}

#[tokio::test]
async fn destination_falls_back_to_item_id() {
    let app = TestApp::spawn();
    app.seed_transaction(
        "TRV-3003",
        Some(Uuid::new_v4()),
        None,
        Some(json!([{ "id": "DEST-123", "name": "Komodo", "price": 150000, "quantity": 1 }])),
        Some(days_from_today(5)),
    )
    .await;

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3003", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let bookings = app.store.bookings();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].destination_id, 123);
}

#[tokio::test]
async fn missing_destination_acknowledges_without_booking() {
    let app = TestApp::spawn();
    app.seed_transaction(
        "TRV-3004",
        Some(Uuid::new_v4()),
        None,
        Some(json!([{ "id": "GIFT", "name": "Voucher", "price": 150000, "quantity": 1 }])),
        Some(days_from_today(5)),
    )
    .await;

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3004", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "success");
    assert!(app.store.bookings().is_empty());

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3004")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Success);
}

#[tokio::test]
async fn missing_visit_date_acknowledges_without_booking() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3005", Some(Uuid::new_v4()), Some(9), None, None)
        .await;

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3005", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(app.store.bookings().is_empty());
}

#[tokio::test]
async fn unknown_order_is_still_acknowledged() {
    let app = TestApp::spawn();

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-unknown", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(app.store.bookings().is_empty());
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3006", Some(Uuid::new_v4()), Some(1), None, Some(days_from_today(3)))
        .await;

    let mut payload = signed_notification("TRV-3006", "settlement");
    payload["gross_amount"] = json!("1.00");

    let response = app.post_json(WEBHOOK, None, payload).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["success"], false);
    assert!(app.store.bookings().is_empty());

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3006")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Pending);
}

#[tokio::test]
async fn payload_without_order_id_is_bad_request() {
    let app = TestApp::spawn();

    let response = app
        .post_json(WEBHOOK, None, json!({ "transaction_status": "settlement" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = TestApp::spawn();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn webhook_is_post_only() {
    let app = TestApp::spawn();
    let response = app.get(WEBHOOK, None).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn recurring_and_pay_account_are_logged_only() {
    let app = TestApp::spawn();

    let response = app
        .post_json(
            &format!("{}?type=recurring", WEBHOOK),
            None,
            json!({ "subscription_id": "sub-1", "order_id": "TRV-R1", "transaction_status": "settlement" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Recurring notification processed");

    let response = app
        .post_json(
            &format!("{}?type=pay-account", WEBHOOK),
            None,
            json!({ "account_id": "acc-1", "account_status": "ENABLED", "payment_type": "gopay" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Pay Account notification processed");

    assert!(app.store.bookings().is_empty());
}

#[tokio::test]
async fn late_expire_does_not_downgrade_success() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3007", Some(Uuid::new_v4()), Some(2), None, Some(days_from_today(8)))
        .await;

    let settled = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3007", "settlement"))
        .await;
    assert_eq!(settled.status, StatusCode::OK);

    let expired = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3007", "expire"))
        .await;
    assert_eq!(expired.status, StatusCode::OK);
    assert_eq!(expired.body["status"], "failed");

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3007")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Success);
    assert_eq!(app.store.bookings().len(), 1);
}

#[tokio::test]
async fn gateway_status_overrides_payload_fields() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3008", Some(Uuid::new_v4()), Some(2), None, Some(days_from_today(8)))
        .await;
    app.gateway.set_status(
        "TRV-3008",
        json!({
            "status_code": "201",
            "order_id": "TRV-3008",
            "transaction_status": "pending",
            "payment_type": "bank_transfer",
            "gross_amount": "150000.00"
        }),
    );

    // The payload claims settlement, the gateway says pending.
    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3008", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "pending");
    assert!(app.store.bookings().is_empty());
}

#[tokio::test]
async fn challenged_capture_is_held() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3009", Some(Uuid::new_v4()), Some(2), None, Some(days_from_today(8)))
        .await;

    let mut payload = signed_notification("TRV-3009", "capture");
    payload["fraud_status"] = json!("challenge");
    payload["payment_type"] = json!("credit_card");

    let response = app.post_json(WEBHOOK, None, payload).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "challenge");
    assert!(app.store.bookings().is_empty());

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3009")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Challenge);
    assert_eq!(tx.fraud_status.as_deref(), Some("challenge"));
}

#[tokio::test]
async fn unreachable_gateway_fails_the_delivery() {
    let app = TestApp::spawn_with(TestOptions {
        gateway_reachable: false,
        ..TestOptions::default()
    });
    app.seed_transaction("TRV-3010", Some(Uuid::new_v4()), Some(2), None, Some(days_from_today(8)))
        .await;

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3010", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.bookings().is_empty());
}

#[tokio::test]
async fn order_unknown_to_gateway_is_acknowledged_and_ignored() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-3011", Some(Uuid::new_v4()), Some(2), None, Some(days_from_today(8)))
        .await;
    app.gateway.set_status(
        "TRV-3011",
        json!({ "status_code": "404", "status_message": "Transaction doesn't exist." }),
    );

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-3011", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(
        response.body["message"],
        "Transaction not found at gateway, notification ignored"
    );
    assert!(response.body.get("status").is_none());
    assert!(app.store.bookings().is_empty());

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-3011")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Pending);
}

#[tokio::test]
async fn order_id_with_path_characters_is_bad_request() {
    let app = TestApp::spawn();

    let response = app
        .post_json(WEBHOOK, None, signed_notification("TRV-1/../VICTIM", "settlement"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert!(app.store.bookings().is_empty());
}
