//! In-process gateway double for tests.

use super::{
    check_signature, notification_order_id, validate_order_id, whole_amount, CheckoutRequest,
    CheckoutSession, GatewayError, GatewayStatus, PaymentGateway,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock gateway: checks signatures with its server key and answers status
/// queries from a table the test controls.
pub struct MockGateway {
    server_key: String,
    statuses: Mutex<HashMap<String, Value>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    unreachable: bool,
}

impl MockGateway {
    pub fn new(server_key: &str) -> Self {
        Self {
            server_key: server_key.to_string(),
            statuses: Mutex::new(HashMap::new()),
            checkouts: Mutex::new(Vec::new()),
            unreachable: false,
        }
    }

    /// A gateway whose API calls all fail with a network error.
    pub fn unreachable(server_key: &str) -> Self {
        Self {
            unreachable: true,
            ..Self::new(server_key)
        }
    }

    /// Set the status body the gateway reports for `order_id`.
    pub fn set_status(&self, order_id: &str, body: Value) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(order_id.to_string(), body);
        }
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn ensure_reachable(&self) -> Result<(), GatewayError> {
        if self.unreachable {
            Err(GatewayError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_transaction(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.ensure_reachable()?;
        validate_order_id(&request.order_id)?;
        whole_amount(request.gross_amount)?;
        for item in &request.items {
            whole_amount(item.price)?;
        }

        if let Ok(mut checkouts) = self.checkouts.lock() {
            checkouts.push(request.clone());
        }

        let token = format!("mock-token-{}", request.order_id);
        Ok(CheckoutSession {
            redirect_url: format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{}", token),
            token,
            client_key: Some("mock-client-key".to_string()),
        })
    }

    async fn transaction_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError> {
        self.ensure_reachable()?;
        validate_order_id(order_id)?;

        let body = self
            .statuses
            .lock()
            .map_err(|_| GatewayError::Api("mock state poisoned".to_string()))?
            .get(order_id)
            .cloned()
            .ok_or(GatewayError::NotFound)?;

        GatewayStatus::from_value(body)
    }

    async fn verify_notification(&self, notification: &Value) -> Result<GatewayStatus, GatewayError> {
        let order_id = notification_order_id(notification)?;
        check_signature(notification, &self.server_key)?;
        self.ensure_reachable()?;

        // Orders the test did not register answer with the notification itself.
        let known = self
            .statuses
            .lock()
            .map(|s| s.contains_key(&order_id))
            .unwrap_or(false);
        if known {
            self.transaction_status(&order_id).await
        } else {
            GatewayStatus::from_value(notification.clone())
        }
    }
}
