mod common;

use axum::http::StatusCode;
use booking_service::models::TransactionStatus;
use booking_service::services::BookingStore;
use common::{TestApp, TestOptions};
use serde_json::json;
use uuid::Uuid;

fn checkout_body(order_id: &str, user_id: Uuid) -> serde_json::Value {
    json!({
        "orderId": order_id,
        "grossAmount": 250000,
        "customerDetails": {
            "firstName": "Dewi",
            "lastName": "Lestari",
            "email": "dewi@example.com",
            "phone": "081234567890"
        },
        "itemDetails": [
            { "id": "DEST-12", "name": "Borobudur Sunrise", "price": 125000, "quantity": 2 }
        ],
        "metadata": {
            "tripDataId": 12,
            "userId": user_id,
            "visitDate": "2025-07-01"
        }
    })
}

#[tokio::test]
async fn create_transaction_returns_token_and_persists_pending_row() {
    let app = TestApp::spawn();
    let user = Uuid::new_v4();

    let response = app
        .post_json("/api/payments/transactions", None, checkout_body("TRV-1001", user))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["orderId"], "TRV-1001");
    assert_eq!(response.body["token"], "mock-token-TRV-1001");
    assert!(response.body["redirectUrl"].as_str().unwrap().contains("mock-token-TRV-1001"));
    assert_eq!(response.body["clientKey"], "mock-client-key");

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-1001")
        .await
        .unwrap()
        .expect("transaction row");
    assert_eq!(tx.status(), TransactionStatus::Pending);
    assert_eq!(tx.currency, "IDR");
    assert_eq!(tx.user_id, Some(user));
    assert_eq!(tx.trip_data_id, Some(12));
    assert_eq!(tx.visit_date.as_deref(), Some("2025-07-01"));
    assert_eq!(tx.customer_name.as_deref(), Some("Dewi Lestari"));
    assert_eq!(tx.first_item_quantity(), 2);

    let checkouts = app.gateway.checkouts();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].destination_id, Some(12));
    assert_eq!(checkouts[0].items.len(), 1);
}

#[tokio::test]
async fn create_transaction_requires_core_fields() {
    let app = TestApp::spawn();

    for body in [
        json!({ "grossAmount": 1000, "customerDetails": { "firstName": "A", "email": "a@example.com" } }),
        json!({ "orderId": "TRV-1", "customerDetails": { "firstName": "A", "email": "a@example.com" } }),
        json!({ "orderId": "TRV-1", "grossAmount": 0, "customerDetails": { "firstName": "A", "email": "a@example.com" } }),
        json!({ "orderId": "TRV-1", "grossAmount": 1000 }),
    ] {
        let response = app.post_json("/api/payments/transactions", None, body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["error"],
            "Missing required fields: orderId, grossAmount, customerDetails"
        );
    }
    assert!(app.gateway.checkouts().is_empty());
}

#[tokio::test]
async fn create_transaction_rejects_invalid_email() {
    let app = TestApp::spawn();
    let mut body = checkout_body("TRV-1002", Uuid::new_v4());
    body["customerDetails"]["email"] = json!("not-an-email");

    let response = app.post_json("/api/payments/transactions", None, body).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn fractional_rupiah_amounts_are_rejected() {
    let app = TestApp::spawn();

    let mut fractional_gross = checkout_body("TRV-1005", Uuid::new_v4());
    fractional_gross["grossAmount"] = json!(15.05);
    let mut fractional_item = checkout_body("TRV-1006", Uuid::new_v4());
    fractional_item["itemDetails"][0]["price"] = json!("125000.50");

    for body in [fractional_gross, fractional_item] {
        let response = app.post_json("/api/payments/transactions", None, body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["error"],
            "grossAmount and item prices must be whole rupiah amounts"
        );
    }

    assert!(app.gateway.checkouts().is_empty());
    for order_id in ["TRV-1005", "TRV-1006"] {
        assert!(app
            .store
            .get_transaction_by_order_id(order_id)
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn order_id_must_be_url_safe() {
    let app = TestApp::spawn();

    for order_id in ["TRV-1/../VICTIM", "TRV 1", "VICTIM/status?"] {
        let response = app
            .post_json(
                "/api/payments/transactions",
                None,
                checkout_body(order_id, Uuid::new_v4()),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", order_id);
    }
    assert!(app.gateway.checkouts().is_empty());

    let status = app
        .get("/api/payments/status?orderId=VICTIM%2Fstatus%3F", None)
        .await;
    assert_eq!(status.status, StatusCode::BAD_REQUEST);
    assert_eq!(status.body["error"], "Missing or invalid orderId parameter");
}

#[tokio::test]
async fn duplicate_order_id_is_conflict() {
    let app = TestApp::spawn();
    let user = Uuid::new_v4();

    let first = app
        .post_json("/api/payments/transactions", None, checkout_body("TRV-1003", user))
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app
        .post_json("/api/payments/transactions", None, checkout_body("TRV-1003", user))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(app.gateway.checkouts().len(), 1);
}

#[tokio::test]
async fn unreachable_gateway_is_bad_gateway() {
    let app = TestApp::spawn_with(TestOptions {
        gateway_reachable: false,
        ..TestOptions::default()
    });

    let response = app
        .post_json("/api/payments/transactions", None, checkout_body("TRV-1004", Uuid::new_v4()))
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(app
        .store
        .get_transaction_by_order_id("TRV-1004")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn create_transaction_is_post_only() {
    let app = TestApp::spawn();
    let response = app.get("/api/payments/transactions", None).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body["error"], "Method not allowed");
}

#[tokio::test]
async fn status_check_returns_gateway_fields_and_updates_row() {
    let app = TestApp::spawn();
    app.seed_transaction("TRV-2001", Some(Uuid::new_v4()), Some(3), None, None)
        .await;
    app.gateway.set_status(
        "TRV-2001",
        json!({
            "status_code": "200",
            "order_id": "TRV-2001",
            "transaction_status": "capture",
            "fraud_status": "challenge",
            "payment_type": "credit_card",
            "gross_amount": "150000.00",
            "transaction_time": "2025-06-01 10:00:00"
        }),
    );

    let response = app.get("/api/payments/status?orderId=TRV-2001", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let data = &response.body["data"];
    assert_eq!(data["orderId"], "TRV-2001");
    assert_eq!(data["transactionStatus"], "capture");
    assert_eq!(data["fraudStatus"], "challenge");
    assert_eq!(data["paymentType"], "credit_card");
    assert_eq!(data["grossAmount"], "150000.00");
    assert_eq!(data["statusCode"], "200");

    let tx = app
        .store
        .get_transaction_by_order_id("TRV-2001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status(), TransactionStatus::Challenge);
    assert_eq!(tx.payment_type.as_deref(), Some("credit_card"));
}

#[tokio::test]
async fn status_check_for_unknown_order_is_not_found() {
    let app = TestApp::spawn();

    let response = app.get("/api/payments/status?orderId=TRV-missing", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "Transaction not found");
}

#[tokio::test]
async fn status_check_requires_order_id() {
    let app = TestApp::spawn();

    let response = app.get("/api/payments/status", None).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Missing or invalid orderId parameter");
}
