//! Midtrans client.
//!
//! Snap API for hosted checkout sessions, Core API for transaction status.
//! Notifications are authenticated with the `signature_key` digest and then
//! re-read from the Core API, so only the gateway's own answer is trusted.

use super::{
    check_signature, notification_order_id, validate_order_id, whole_amount, CheckoutRequest,
    CheckoutSession, GatewayError, GatewayStatus, PaymentGateway,
};
use crate::config::MidtransConfig;
use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::observability::TracedRequestExt;
use service_core::utils::mask_order_id;
use std::time::Duration;

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com";

/// Midtrans client.
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    config: MidtransConfig,
    snap_base_url: String,
    api_base_url: String,
}

#[derive(Debug, Serialize)]
struct SnapTransactionRequest {
    transaction_details: SnapTransactionDetails,
    customer_details: SnapCustomerDetails,
    item_details: Vec<SnapItem>,
    callbacks: SnapCallbacks,
    credit_card: SnapCreditCard,
    custom_field1: String,
    custom_field2: String,
    custom_field3: String,
}

#[derive(Debug, Serialize)]
struct SnapTransactionDetails {
    order_id: String,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapCustomerDetails {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
}

#[derive(Debug, Serialize)]
struct SnapItem {
    id: String,
    price: i64,
    quantity: i32,
    name: String,
}

#[derive(Debug, Serialize)]
struct SnapCallbacks {
    finish: String,
    error: String,
    pending: String,
}

#[derive(Debug, Serialize)]
struct SnapCreditCard {
    secure: bool,
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapErrorResponse {
    error_messages: Option<Vec<String>>,
}

impl MidtransClient {
    pub fn new(config: MidtransConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let snap_base_url = config.snap_base_url.clone().unwrap_or_else(|| {
            if config.is_production {
                PRODUCTION_SNAP_URL.to_string()
            } else {
                SANDBOX_SNAP_URL.to_string()
            }
        });
        let api_base_url = config.api_base_url.clone().unwrap_or_else(|| {
            if config.is_production {
                PRODUCTION_API_URL.to_string()
            } else {
                SANDBOX_API_URL.to_string()
            }
        });

        Ok(Self {
            client,
            config,
            snap_base_url: snap_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check if the server key is set.
    pub fn is_configured(&self) -> bool {
        !self.config.server_key.expose_secret().is_empty()
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::NotConfigured(
                "MIDTRANS_SERVER_KEY not set".to_string(),
            ))
        }
    }

    /// `{api_base_url}/v2/{order_id}/status`, with the order id as a single
    /// encoded path segment.
    fn status_url(&self, order_id: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| GatewayError::NotConfigured(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::NotConfigured("API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("v2")
            .push(order_id)
            .push("status");
        Ok(url)
    }

    fn build_snap_request(&self, request: &CheckoutRequest) -> Result<SnapTransactionRequest, GatewayError> {
        let gross_amount = whole_amount(request.gross_amount)?;

        let item_details = if request.items.is_empty() {
            vec![SnapItem {
                id: "TRIP-001".to_string(),
                price: gross_amount,
                quantity: 1,
                name: "Trip Package".to_string(),
            }]
        } else {
            request
                .items
                .iter()
                .map(|item| {
                    Ok(SnapItem {
                        id: item.id.clone(),
                        price: whole_amount(item.price)?,
                        quantity: item.quantity,
                        name: item.name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, GatewayError>>()?
        };

        let app_url = self.config.app_url.trim_end_matches('/');

        Ok(SnapTransactionRequest {
            transaction_details: SnapTransactionDetails {
                order_id: request.order_id.clone(),
                gross_amount,
            },
            customer_details: SnapCustomerDetails {
                first_name: request.customer.first_name.clone(),
                last_name: request.customer.last_name.clone().unwrap_or_default(),
                email: request.customer.email.clone(),
                phone: request.customer.phone.clone().unwrap_or_default(),
            },
            item_details,
            callbacks: SnapCallbacks {
                finish: format!("{}/payment/finish", app_url),
                error: format!("{}/payment/error", app_url),
                pending: format!("{}/payment/pending", app_url),
            },
            credit_card: SnapCreditCard { secure: true },
            custom_field1: request.visit_date.clone().unwrap_or_default(),
            custom_field2: request
                .destination_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            custom_field3: request
                .booking_type
                .clone()
                .unwrap_or_else(|| "trip".to_string()),
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_transaction(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.ensure_configured()?;

        let body = self.build_snap_request(request)?;
        let url = format!("{}/snap/v1/transactions", self.snap_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.server_key.expose_secret(), Some(""))
            .header("Accept", "application/json")
            .json(&body)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<SnapErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error_messages)
                .map(|messages| messages.join("; "))
                .unwrap_or(text);
            tracing::warn!(
                status = %status,
                order_id = %mask_order_id(&request.order_id),
                "Snap transaction rejected"
            );
            return Err(GatewayError::Api(format!("Snap API error {}: {}", status, detail)));
        }

        let session: SnapTransactionResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("Failed to parse Snap response: {}", e)))?;

        tracing::info!(
            order_id = %mask_order_id(&request.order_id),
            "Snap transaction created"
        );

        Ok(CheckoutSession {
            token: session.token,
            redirect_url: session.redirect_url,
            client_key: Some(self.config.client_key.clone()).filter(|k| !k.is_empty()),
        })
    }

    async fn transaction_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError> {
        self.ensure_configured()?;
        validate_order_id(order_id)?;

        let url = self.status_url(order_id)?;

        let response = self
            .client
            .get(url)
            .basic_auth(self.config.server_key.expose_secret(), Some(""))
            .header("Accept", "application/json")
            .with_trace_context()
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Api(format!("Core API error {}: {}", status, text)));
        }

        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("Failed to parse status response: {}", e)))?;

        let parsed = GatewayStatus::from_value(raw)?;

        tracing::debug!(
            order_id = %mask_order_id(order_id),
            transaction_status = %parsed.transaction_status,
            "Fetched transaction status"
        );

        Ok(parsed)
    }

    async fn verify_notification(&self, notification: &Value) -> Result<GatewayStatus, GatewayError> {
        self.ensure_configured()?;

        let order_id = notification_order_id(notification)?;
        check_signature(notification, self.config.server_key.expose_secret())?;

        self.transaction_status(&order_id).await
    }
}
