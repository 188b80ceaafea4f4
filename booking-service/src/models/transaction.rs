//! Payment transaction model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Internal transaction status, derived from the gateway vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Challenge,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Challenge => "challenge",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "success" => TransactionStatus::Success,
            "challenge" => TransactionStatus::Challenge,
            "failed" => TransactionStatus::Failed,
            _ => TransactionStatus::Pending,
        }
    }

    /// `success` is never overwritten by a later notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction row, one per checkout attempt, keyed by `order_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub order_id: String,
    pub user_id: Option<Uuid>,
    pub booking_type: Option<String>,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub gross_amount: Decimal,
    pub currency: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub trip_data_id: Option<i64>,
    pub item_details: Option<serde_json::Value>,
    /// Visit date as sent to the gateway in `custom_field1`.
    pub visit_date: Option<String>,
    pub payment_type: Option<String>,
    pub fraud_status: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::from_string(&self.status)
    }

    /// Accepts `YYYY-MM-DD` or a full ISO timestamp.
    pub fn parsed_visit_date(&self) -> Option<NaiveDate> {
        let raw = self.visit_date.as_deref()?.trim();
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    /// Quantity of the first line item, at least 1.
    pub fn first_item_quantity(&self) -> i32 {
        self.item_details
            .as_ref()
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("quantity"))
            .and_then(|q| q.as_i64())
            .filter(|q| *q > 0)
            .and_then(|q| i32::try_from(q).ok())
            .unwrap_or(1)
    }
}

/// Input for persisting a freshly created checkout.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: String,
    pub user_id: Option<Uuid>,
    pub booking_type: Option<String>,
    pub gross_amount: Decimal,
    pub currency: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub trip_data_id: Option<i64>,
    pub item_details: Option<serde_json::Value>,
    pub visit_date: Option<String>,
}

/// Status change reported by the gateway.
#[derive(Debug, Clone)]
pub struct TransactionUpdate {
    pub status: TransactionStatus,
    pub payment_type: Option<String>,
    pub fraud_status: Option<String>,
    pub gateway_response: serde_json::Value,
}

/// Result of applying a [`TransactionUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Row is already `success` and the update would downgrade it.
    Unchanged,
    NotFound,
}
