//! Payment notification reconciliation.
//!
//! Verify, map, update the transaction, and on success derive the booking and
//! purchase receipt. Only verification failures are reported to the caller;
//! every later write is best-effort so the gateway always gets its ack.

use crate::models::{
    BookingStatus, NewBooking, NewPurchase, Transaction, TransactionStatus, TransactionUpdate,
    UpdateOutcome,
};
use crate::services::gateway::{GatewayError, GatewayStatus, PaymentGateway};
use crate::services::metrics::{record_derivative_failure, record_notification};
use crate::services::status_mapper::map_status;
use crate::services::store::BookingStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use service_core::utils::mask_order_id;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

static FIRST_DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("digit run pattern is valid"));

/// Destination for a transaction: the stored id, else the first digit run of
/// the first item id (`"DEST-123"` -> 123).
pub fn resolve_destination_id(transaction: &Transaction) -> Option<i64> {
    if let Some(id) = transaction.trip_data_id.filter(|id| *id > 0) {
        return Some(id);
    }

    let first_item = transaction.item_details.as_ref()?.as_array()?.first()?;
    let item_id = match first_item.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    FIRST_DIGIT_RUN
        .find(&item_id)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// What happened to the booking side of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Status is not `success`.
    NotApplicable,
    Created { booking_id: i64 },
    AlreadyExists,
    Skipped(&'static str),
    Failed,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub order_id: String,
    pub status: TransactionStatus,
    pub transaction: Option<UpdateOutcome>,
    pub booking: BookingOutcome,
}

#[derive(Clone)]
pub struct NotificationReconciler {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl NotificationReconciler {
    pub fn new(store: Arc<dyn BookingStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    #[instrument(skip(self, notification))]
    pub async fn reconcile(&self, notification: &Value) -> Result<ReconcileOutcome, GatewayError> {
        let verified = self.gateway.verify_notification(notification).await?;
        let status = map_status(&verified.transaction_status, verified.fraud_status.as_deref());
        let order_id = verified.order_id.clone();

        info!(
            order_id = %mask_order_id(&order_id),
            transaction_status = %verified.transaction_status,
            fraud_status = verified.fraud_status.as_deref().unwrap_or("-"),
            payment_type = verified.payment_type.as_deref().unwrap_or("-"),
            mapped_status = %status,
            "Transaction notification verified"
        );
        record_notification(status.as_str());

        let transaction = self.apply_status(&verified, status).await;

        let booking = if status == TransactionStatus::Success {
            self.create_booking(&order_id, verified.payment_type.clone()).await
        } else {
            BookingOutcome::NotApplicable
        };

        info!(
            order_id = %mask_order_id(&order_id),
            status = %status,
            booking = ?booking,
            "Transaction notification processed"
        );

        Ok(ReconcileOutcome {
            order_id,
            status,
            transaction,
            booking,
        })
    }

    /// Persist the status reported by the gateway. Shared with the
    /// status-check endpoint.
    pub async fn apply_status(
        &self,
        verified: &GatewayStatus,
        status: TransactionStatus,
    ) -> Option<UpdateOutcome> {
        let update = TransactionUpdate {
            status,
            payment_type: verified.payment_type.clone(),
            fraud_status: verified.fraud_status.clone(),
            gateway_response: verified.raw.clone(),
        };

        match self.store.apply_transaction_status(&verified.order_id, update).await {
            Ok(UpdateOutcome::NotFound) => {
                warn!(
                    order_id = %mask_order_id(&verified.order_id),
                    "No transaction row for notification"
                );
                Some(UpdateOutcome::NotFound)
            }
            Ok(UpdateOutcome::Unchanged) => {
                info!(
                    order_id = %mask_order_id(&verified.order_id),
                    reported = %status,
                    "Transaction already settled, keeping success"
                );
                Some(UpdateOutcome::Unchanged)
            }
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    order_id = %mask_order_id(&verified.order_id),
                    error = %e,
                    "Failed to update transaction"
                );
                record_derivative_failure("transaction_update");
                None
            }
        }
    }

    async fn create_booking(&self, order_id: &str, payment_type: Option<String>) -> BookingOutcome {
        let transaction = match self.store.get_transaction_by_order_id(order_id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                warn!(order_id = %mask_order_id(order_id), "Transaction missing, booking skipped");
                return BookingOutcome::Skipped("transaction_missing");
            }
            Err(e) => {
                error!(order_id = %mask_order_id(order_id), error = %e, "Failed to load transaction");
                record_derivative_failure("booking");
                return BookingOutcome::Failed;
            }
        };

        let Some(destination_id) = resolve_destination_id(&transaction) else {
            warn!(order_id = %mask_order_id(order_id), "Missing destination id, booking skipped");
            return BookingOutcome::Skipped("destination_missing");
        };
        let Some(user_id) = transaction.user_id else {
            warn!(order_id = %mask_order_id(order_id), "Missing user id, booking skipped");
            return BookingOutcome::Skipped("user_missing");
        };
        let Some(visit_date) = transaction.parsed_visit_date() else {
            warn!(order_id = %mask_order_id(order_id), "Missing visit date, booking skipped");
            return BookingOutcome::Skipped("visit_date_missing");
        };

        let input = NewBooking {
            order_id: order_id.to_string(),
            user_id,
            destination_id,
            visit_date,
            quantity: transaction.first_item_quantity(),
            total_price: transaction.gross_amount,
            status: BookingStatus::Confirmed,
        };

        let booking = match self.store.create_booking_for_order(input).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                info!(order_id = %mask_order_id(order_id), "Booking already exists for order");
                return BookingOutcome::AlreadyExists;
            }
            Err(e) => {
                error!(order_id = %mask_order_id(order_id), error = %e, "Failed to create booking");
                record_derivative_failure("booking");
                return BookingOutcome::Failed;
            }
        };

        info!(
            order_id = %mask_order_id(order_id),
            booking_id = booking.id,
            "Booking created"
        );

        let purchase = NewPurchase {
            user_id,
            booking_id: Some(booking.id),
            amount: transaction.gross_amount,
            payment_method: payment_type.or(transaction.payment_type),
        };
        match self.store.create_purchase(purchase).await {
            Ok(p) => info!(order_id = %mask_order_id(order_id), purchase_id = p.id, "Purchase recorded"),
            Err(e) => {
                error!(order_id = %mask_order_id(order_id), error = %e, "Failed to record purchase");
                record_derivative_failure("purchase");
            }
        }

        BookingOutcome::Created {
            booking_id: booking.id,
        }
    }
}
