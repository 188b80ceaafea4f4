//! Refund and purchase receipt models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Completed => "completed",
            RefundStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RefundStatus::Pending),
            "approved" => Some(RefundStatus::Approved),
            "completed" => Some(RefundStatus::Completed),
            "rejected" => Some(RefundStatus::Rejected),
            _ => None,
        }
    }

    /// Statuses that block another refund request for the same booking.
    pub fn blocks_new_request(&self) -> bool {
        !matches!(self, RefundStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: i64,
    pub user_id: Uuid,
    pub booking_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub reason: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub refund_amount: Decimal,
    pub refund_percentage: i32,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Refund {
    pub fn status(&self) -> Option<RefundStatus> {
        RefundStatus::parse(&self.status)
    }
}

/// Refund request as handed to the store. `today` is the business date the
/// eligibility re-check runs against.
#[derive(Debug, Clone)]
pub struct NewRefund {
    pub user_id: Uuid,
    pub booking_id: i64,
    pub reason: String,
    pub today: NaiveDate,
}

/// Denormalized receipt written next to a booking created from a payment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i64,
    pub user_id: Uuid,
    pub booking_id: Option<i64>,
    pub ticket_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub booking_id: Option<i64>,
    pub amount: Decimal,
    pub payment_method: Option<String>,
}
