//! Booking model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Paid,
    Confirmed,
    Used,
    Cancelled,
    RefundRequested,
    Refunded,
}

impl BookingStatus {
    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::PendingPayment,
        BookingStatus::Paid,
        BookingStatus::Confirmed,
    ];

    pub const HISTORY: [BookingStatus; 3] = [
        BookingStatus::Used,
        BookingStatus::Refunded,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Paid => "paid",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Used => "used",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::RefundRequested => "refund_requested",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(BookingStatus::PendingPayment),
            "paid" => Some(BookingStatus::Paid),
            "confirmed" => Some(BookingStatus::Confirmed),
            "used" => Some(BookingStatus::Used),
            "cancelled" => Some(BookingStatus::Cancelled),
            "refund_requested" => Some(BookingStatus::RefundRequested),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }

    /// Paid-for bookings that can still be refunded or become `used`.
    pub fn is_paid(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Confirmed)
    }

    pub fn is_cancellable(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed reservation for a destination and visit date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub order_id: Option<String>,
    pub user_id: Uuid,
    pub destination_id: i64,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> Option<BookingStatus> {
        BookingStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub order_id: String,
    pub user_id: Uuid,
    pub destination_id: i64,
    pub visit_date: NaiveDate,
    pub quantity: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
}

/// Result of a cancellation attempt.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Booking),
    NotCancellable(String),
    NotFound,
}
