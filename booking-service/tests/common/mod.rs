#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use booking_service::config::CorsConfig;
use booking_service::models::{Booking, BookingStatus, NewTransaction};
use booking_service::services::{
    BookingStore, BusinessClock, InMemoryStore, MockGateway, MockTextProvider,
};
use booking_service::{build_router, AppState};
use chrono::{Duration, NaiveDate};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::middleware::{IpRateLimiter, LocalRateLimitStore, SharedRateLimiter};
use service_core::utils::sha512_hex;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const SERVER_KEY: &str = "SB-Mid-server-integration";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub struct TestOptions {
    pub gateway_reachable: bool,
    pub text_provider_enabled: bool,
    pub rate_limit: u32,
    pub trust_forwarded_for: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            gateway_reachable: true,
            text_provider_enabled: true,
            rate_limit: 100,
            trust_forwarded_for: true,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<MockGateway>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(TestOptions::default())
    }

    pub fn spawn_with(options: TestOptions) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(if options.gateway_reachable {
            MockGateway::new(SERVER_KEY)
        } else {
            MockGateway::unreachable(SERVER_KEY)
        });
        let limiter_store: SharedRateLimiter = Arc::new(
            LocalRateLimitStore::new(options.rate_limit, std::time::Duration::from_secs(60))
                .expect("Failed to create rate limiter"),
        );
        let limiter = IpRateLimiter::new(limiter_store, options.trust_forwarded_for);

        let state = AppState::new(
            store.clone(),
            gateway.clone(),
            Arc::new(MockTextProvider::new(options.text_provider_enabled)),
            limiter,
            BusinessClock::fixed(today()),
        );
        let cors = CorsConfig {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        };

        Self {
            router: build_router(state, &cors),
            store,
            gateway,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<Uuid>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-User-ID", user.to_string());
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, user: Option<Uuid>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(user) = user {
            builder = builder.header("X-User-ID", user.to_string());
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Seed a pending transaction as the checkout endpoint would.
    pub async fn seed_transaction(
        &self,
        order_id: &str,
        user_id: Option<Uuid>,
        trip_data_id: Option<i64>,
        item_details: Option<Value>,
        visit_date: Option<NaiveDate>,
    ) {
        self.store
            .create_transaction(NewTransaction {
                order_id: order_id.to_string(),
                user_id,
                booking_type: Some("trip".to_string()),
                gross_amount: Decimal::new(150_000, 0),
                currency: "IDR".to_string(),
                customer_name: Some("Dewi Lestari".to_string()),
                customer_email: Some("dewi@example.com".to_string()),
                customer_phone: None,
                snap_token: Some("snap-token".to_string()),
                redirect_url: None,
                trip_data_id,
                item_details,
                visit_date: visit_date.map(|d| d.to_string()),
            })
            .await
            .expect("Failed to seed transaction");
    }

    pub fn seed_booking(&self, user_id: Uuid, days_out: i64, price: i64, status: BookingStatus) -> Booking {
        self.store
            .insert_booking(user_id, 5, days_from_today(days_out), Decimal::new(price, 0), status)
            .expect("Failed to seed booking")
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// A notification signed the way the gateway signs it.
pub fn signed_notification(order_id: &str, transaction_status: &str) -> Value {
    let status_code = "200";
    let gross_amount = "150000.00";
    json!({
        "order_id": order_id,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "transaction_status": transaction_status,
        "payment_type": "bank_transfer",
        "transaction_time": "2025-06-01 09:30:00",
        "signature_key": sha512_hex(&[order_id, status_code, gross_amount, SERVER_KEY]),
    })
}
