//! In-memory [`BookingStore`] for tests and local runs without PostgreSQL.

use super::{BookingStore, RefundWrite};
use crate::models::{
    Booking, BookingStatus, CancelOutcome, NewBooking, NewPurchase, NewRefund, NewTransaction,
    Purchase, Refund, RefundStatus, Transaction, TransactionStatus, TransactionUpdate,
    UpdateOutcome,
};
use crate::services::eligibility::check_eligibility;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    next_id: i64,
    transactions: Vec<Transaction>,
    bookings: Vec<Booking>,
    refunds: Vec<Refund>,
    purchases: Vec<Purchase>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mirrors the PostgreSQL constraints: unique order ids on transactions and
/// bookings, at most one open refund per booking.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("store lock poisoned")))
    }

    /// Seed a booking directly, bypassing the payment flow.
    pub fn insert_booking(
        &self,
        user_id: Uuid,
        destination_id: i64,
        visit_date: NaiveDate,
        total_price: rust_decimal::Decimal,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let booking = Booking {
            id: inner.next_id(),
            order_id: None,
            user_id,
            destination_id,
            visit_date,
            quantity: 1,
            total_price,
            status: status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.bookings.push(booking.clone());
        Ok(booking)
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.lock().map(|i| i.bookings.clone()).unwrap_or_default()
    }

    pub fn purchases(&self) -> Vec<Purchase> {
        self.lock().map(|i| i.purchases.clone()).unwrap_or_default()
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.lock().map(|i| i.refunds.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, AppError> {
        let mut inner = self.lock()?;
        if inner.transactions.iter().any(|t| t.order_id == input.order_id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Order already exists")));
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: inner.next_id(),
            order_id: input.order_id,
            user_id: input.user_id,
            booking_type: input.booking_type,
            status: TransactionStatus::Pending.as_str().to_string(),
            gross_amount: input.gross_amount,
            currency: input.currency,
            customer_name: input.customer_name,
            customer_email: input.customer_email,
            customer_phone: input.customer_phone,
            snap_token: input.snap_token,
            redirect_url: input.redirect_url,
            trip_data_id: input.trip_data_id,
            item_details: input.item_details,
            visit_date: input.visit_date,
            payment_type: None,
            fraud_status: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        };
        inner.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .transactions
            .iter()
            .find(|t| t.order_id == order_id)
            .cloned())
    }

    async fn apply_transaction_status(
        &self,
        order_id: &str,
        update: TransactionUpdate,
    ) -> Result<UpdateOutcome, AppError> {
        let mut inner = self.lock()?;
        let Some(transaction) = inner.transactions.iter_mut().find(|t| t.order_id == order_id)
        else {
            return Ok(UpdateOutcome::NotFound);
        };

        if transaction.status().is_terminal() && update.status != TransactionStatus::Success {
            return Ok(UpdateOutcome::Unchanged);
        }

        transaction.status = update.status.as_str().to_string();
        if update.payment_type.is_some() {
            transaction.payment_type = update.payment_type;
        }
        if update.fraud_status.is_some() {
            transaction.fraud_status = update.fraud_status;
        }
        transaction.gateway_response = Some(update.gateway_response);
        transaction.updated_at = Utc::now();

        Ok(UpdateOutcome::Updated)
    }

    async fn create_booking_for_order(&self, input: NewBooking) -> Result<Option<Booking>, AppError> {
        let mut inner = self.lock()?;
        if inner
            .bookings
            .iter()
            .any(|b| b.order_id.as_deref() == Some(input.order_id.as_str()))
        {
            return Ok(None);
        }

        let now = Utc::now();
        let booking = Booking {
            id: inner.next_id(),
            order_id: Some(input.order_id),
            user_id: input.user_id,
            destination_id: input.destination_id,
            visit_date: input.visit_date,
            quantity: input.quantity,
            total_price: input.total_price,
            status: input.status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.bookings.push(booking.clone());
        Ok(Some(booking))
    }

    async fn create_purchase(&self, input: NewPurchase) -> Result<Purchase, AppError> {
        let mut inner = self.lock()?;
        let purchase = Purchase {
            id: inner.next_id(),
            user_id: input.user_id,
            booking_id: input.booking_id,
            ticket_id: None,
            amount: input.amount,
            payment_method: input.payment_method,
            status: "paid".to_string(),
            created_at: Utc::now(),
        };
        inner.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn get_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        let inner = self.lock()?;
        Ok(inner.bookings.iter().find(|b| b.id == booking_id).cloned())
    }

    async fn list_refunds_for_booking(&self, booking_id: i64) -> Result<Vec<Refund>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .refunds
            .iter()
            .filter(|r| r.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn create_refund_request(&self, input: NewRefund) -> Result<RefundWrite, AppError> {
        // One lock guard covers the check and both writes.
        let mut inner = self.lock()?;

        let Some(booking) = inner
            .bookings
            .iter()
            .find(|b| b.id == input.booking_id && b.user_id == input.user_id)
            .cloned()
        else {
            return Ok(RefundWrite::BookingNotFound);
        };

        let refunds: Vec<Refund> = inner
            .refunds
            .iter()
            .filter(|r| r.booking_id == Some(booking.id))
            .cloned()
            .collect();

        let eligibility = check_eligibility(&booking, &refunds, input.today);
        if !eligibility.eligible {
            return Ok(RefundWrite::Ineligible(eligibility));
        }

        let refund = Refund {
            id: inner.next_id(),
            user_id: input.user_id,
            booking_id: Some(booking.id),
            ticket_id: None,
            reason: input.reason,
            refund_amount: eligibility.refund_amount,
            refund_percentage: eligibility.refund_percentage,
            status: RefundStatus::Pending.as_str().to_string(),
            requested_at: Utc::now(),
            processed_at: None,
        };
        inner.refunds.push(refund.clone());

        if let Some(b) = inner.bookings.iter_mut().find(|b| b.id == booking.id) {
            b.status = BookingStatus::RefundRequested.as_str().to_string();
            b.updated_at = Utc::now();
        }

        Ok(RefundWrite::Created {
            refund,
            eligibility,
        })
    }

    async fn mark_past_bookings_used(&self, user_id: Uuid, today: NaiveDate) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let mut moved = 0;
        for booking in inner.bookings.iter_mut().filter(|b| {
            b.user_id == user_id
                && b.visit_date < today
                && b.status().is_some_and(|s| s.is_paid())
        }) {
            booking.status = BookingStatus::Used.as_str().to_string();
            booking.updated_at = Utc::now();
            moved += 1;
        }
        Ok(moved)
    }

    async fn list_active_bookings(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, AppError> {
        let inner = self.lock()?;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .iter()
            .filter(|b| {
                b.user_id == user_id
                    && b.visit_date >= today
                    && b.status().is_some_and(|s| BookingStatus::ACTIVE.contains(&s))
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.visit_date, b.id));
        Ok(bookings)
    }

    async fn list_booking_history(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let inner = self.lock()?;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .iter()
            .filter(|b| {
                b.user_id == user_id
                    && b.status().is_some_and(|s| BookingStatus::HISTORY.contains(&s))
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| std::cmp::Reverse((b.visit_date, b.id)));
        Ok(bookings)
    }

    async fn cancel_booking(&self, booking_id: i64, user_id: Uuid) -> Result<CancelOutcome, AppError> {
        let mut inner = self.lock()?;
        let Some(booking) = inner
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id && b.user_id == user_id)
        else {
            return Ok(CancelOutcome::NotFound);
        };

        if !booking.status().is_some_and(|s| s.is_cancellable()) {
            return Ok(CancelOutcome::NotCancellable(booking.status.clone()));
        }

        booking.status = BookingStatus::Cancelled.as_str().to_string();
        booking.updated_at = Utc::now();
        Ok(CancelOutcome::Cancelled(booking.clone()))
    }

    async fn list_user_refunds(&self, user_id: Uuid) -> Result<Vec<Refund>, AppError> {
        let inner = self.lock()?;
        let mut refunds: Vec<Refund> = inner
            .refunds
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|r| std::cmp::Reverse((r.requested_at, r.id)));
        Ok(refunds)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}
