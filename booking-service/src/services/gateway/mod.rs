//! Payment gateway abstraction.
//!
//! [`MidtransClient`] talks to the real gateway; [`MockGateway`] is used by
//! the integration tests.

pub mod midtrans;
pub mod mock;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::error::AppError;
use service_core::utils::{digests_match, sha512_hex};
use thiserror::Error;

pub use midtrans::MidtransClient;
pub use mock::MockGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Payment gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Transaction not found")]
    NotFound,

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),

    #[error("Gateway API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => {
                AppError::NotFound(anyhow::anyhow!("Transaction not found"))
            }
            GatewayError::InvalidSignature => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid notification signature"))
            }
            GatewayError::InvalidPayload(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            GatewayError::NotConfigured(msg) => AppError::InternalError(anyhow::anyhow!(
                "Payment gateway not configured: {}",
                msg
            )),
            GatewayError::Api(msg) | GatewayError::Network(msg) => AppError::BadGateway(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ItemDetail {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// Everything the gateway needs to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: String,
    pub gross_amount: Decimal,
    pub customer: CustomerDetails,
    pub items: Vec<ItemDetail>,
    pub visit_date: Option<String>,
    pub destination_id: Option<i64>,
    pub booking_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
    /// Public key the browser needs to open the Snap popup.
    pub client_key: Option<String>,
}

/// Authoritative transaction status as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_type: Option<String>,
    pub gross_amount: Option<String>,
    pub transaction_time: Option<String>,
    pub status_code: Option<String>,
    /// Full response body, persisted as-is.
    pub raw: Value,
}

impl GatewayStatus {
    /// Parse a status body. `status_code: "404"` means the order is unknown.
    pub fn from_value(raw: Value) -> Result<Self, GatewayError> {
        if !raw.is_object() {
            return Err(GatewayError::Api("Unexpected status response".to_string()));
        }

        let status_code = string_field(&raw, "status_code");
        if status_code.as_deref() == Some("404") {
            return Err(GatewayError::NotFound);
        }

        let transaction_status = string_field(&raw, "transaction_status").ok_or_else(|| {
            GatewayError::Api(
                string_field(&raw, "status_message")
                    .unwrap_or_else(|| "Missing transaction_status".to_string()),
            )
        })?;
        let order_id = string_field(&raw, "order_id")
            .ok_or_else(|| GatewayError::Api("Missing order_id".to_string()))?;

        Ok(Self {
            order_id,
            transaction_status,
            fraud_status: string_field(&raw, "fraud_status"),
            payment_type: string_field(&raw, "payment_type"),
            gross_amount: string_field(&raw, "gross_amount"),
            transaction_time: string_field(&raw, "transaction_time"),
            status_code,
            raw,
        })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn transaction_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError>;

    /// Authenticate a webhook payload and return the authoritative status.
    /// Payload fields other than the order id are never trusted.
    async fn verify_notification(&self, notification: &Value) -> Result<GatewayStatus, GatewayError>;
}

fn string_field(notification: &Value, key: &str) -> Option<String> {
    match notification.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// IDR has no minor unit on the wire, so fractional amounts are refused
/// rather than rounded.
pub fn whole_amount(amount: Decimal) -> Result<i64, GatewayError> {
    if !amount.fract().is_zero() {
        return Err(GatewayError::InvalidPayload(format!(
            "Amount must be a whole number of rupiah: {}",
            amount
        )));
    }
    amount
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidPayload(format!("Amount out of range: {}", amount)))
}

/// Longest order id the gateway accepts.
pub const MAX_ORDER_ID_LEN: usize = 50;

/// Order ids travel in URL paths, so only unreserved characters are allowed.
pub fn validate_order_id(order_id: &str) -> Result<(), GatewayError> {
    if order_id.is_empty() || order_id.len() > MAX_ORDER_ID_LEN {
        return Err(GatewayError::InvalidPayload(format!(
            "order_id must be 1 to {} characters",
            MAX_ORDER_ID_LEN
        )));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~');
    if order_id.chars().all(allowed) && order_id != "." && order_id != ".." {
        Ok(())
    } else {
        Err(GatewayError::InvalidPayload(
            "order_id contains unsupported characters".to_string(),
        ))
    }
}

/// The order id a notification refers to.
pub fn notification_order_id(notification: &Value) -> Result<String, GatewayError> {
    let order_id = string_field(notification, "order_id")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::InvalidPayload("Missing order_id".to_string()))?;
    validate_order_id(&order_id)?;
    Ok(order_id)
}

/// Check `signature_key = SHA512(order_id + status_code + gross_amount + server_key)`
/// when the payload carries one.
pub fn check_signature(notification: &Value, server_key: &str) -> Result<(), GatewayError> {
    let Some(received) = string_field(notification, "signature_key") else {
        return Ok(());
    };

    let order_id = notification_order_id(notification)?;
    let status_code = string_field(notification, "status_code").unwrap_or_default();
    let gross_amount = string_field(notification, "gross_amount").unwrap_or_default();

    let expected = sha512_hex(&[&order_id, &status_code, &gross_amount, server_key]);
    if digests_match(&expected, &received) {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature)
    }
}
