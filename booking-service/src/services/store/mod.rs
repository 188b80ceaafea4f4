//! Persistence for transactions, bookings, refunds and purchase receipts.

pub mod memory;
pub mod postgres;

use crate::models::{
    Booking, CancelOutcome, NewBooking, NewPurchase, NewRefund, NewTransaction, Purchase, Refund,
    Transaction, TransactionUpdate, UpdateOutcome,
};
use crate::services::eligibility::RefundEligibility;
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Result of the atomic refund write.
#[derive(Debug, Clone)]
pub enum RefundWrite {
    /// Refund row inserted and booking moved to `refund_requested`.
    Created {
        refund: Refund,
        eligibility: RefundEligibility,
    },
    /// The locked re-check found the booking no longer eligible.
    Ineligible(RefundEligibility),
    BookingNotFound,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a pending transaction. A duplicate `order_id` is a conflict.
    async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, AppError>;

    async fn get_transaction_by_order_id(&self, order_id: &str)
        -> Result<Option<Transaction>, AppError>;

    /// Apply a gateway status to the row for `order_id`. A row already in
    /// `success` only accepts another `success`.
    async fn apply_transaction_status(
        &self,
        order_id: &str,
        update: TransactionUpdate,
    ) -> Result<UpdateOutcome, AppError>;

    /// Insert the booking for an order; `None` when one already exists.
    async fn create_booking_for_order(&self, input: NewBooking) -> Result<Option<Booking>, AppError>;

    async fn create_purchase(&self, input: NewPurchase) -> Result<Purchase, AppError>;

    async fn get_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError>;

    async fn list_refunds_for_booking(&self, booking_id: i64) -> Result<Vec<Refund>, AppError>;

    /// Insert a pending refund and flag the booking in one transaction,
    /// re-checking eligibility with the booking row locked.
    async fn create_refund_request(&self, input: NewRefund) -> Result<RefundWrite, AppError>;

    /// Move the user's paid/confirmed bookings with a visit date before
    /// `today` to `used`. Returns the number of bookings moved.
    async fn mark_past_bookings_used(&self, user_id: Uuid, today: NaiveDate) -> Result<u64, AppError>;

    /// Active bookings visiting on or after `today`, soonest first.
    async fn list_active_bookings(&self, user_id: Uuid, today: NaiveDate)
        -> Result<Vec<Booking>, AppError>;

    /// Used, refunded and cancelled bookings, most recent first.
    async fn list_booking_history(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError>;

    async fn cancel_booking(&self, booking_id: i64, user_id: Uuid) -> Result<CancelOutcome, AppError>;

    /// The user's refunds, newest first.
    async fn list_user_refunds(&self, user_id: Uuid) -> Result<Vec<Refund>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
