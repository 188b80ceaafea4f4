//! Refund eligibility lookups and refund requests.

use crate::models::{NewRefund, Refund};
use crate::services::eligibility::{check_eligibility, RefundEligibility};
use crate::services::metrics::record_refund_request;
use crate::services::store::{BookingStore, RefundWrite};
use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RefundError {
    #[error("Booking not found")]
    BookingNotFound,

    #[error("{0}")]
    Ineligible(String),

    #[error("Refund request failed: {0}")]
    Store(AppError),
}

impl From<RefundError> for AppError {
    fn from(err: RefundError) -> Self {
        match err {
            RefundError::BookingNotFound => AppError::NotFound(anyhow::anyhow!("Booking not found")),
            RefundError::Ineligible(reason) => AppError::Conflict(anyhow::anyhow!(reason)),
            RefundError::Store(e) => e,
        }
    }
}

/// A created refund request.
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund: Refund,
    pub eligibility: RefundEligibility,
}

#[derive(Clone)]
pub struct RefundService {
    store: Arc<dyn BookingStore>,
}

impl RefundService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Eligibility of one of the caller's bookings. Bookings owned by someone
    /// else read as not found.
    #[instrument(skip(self))]
    pub async fn eligibility(
        &self,
        user_id: Uuid,
        booking_id: i64,
        today: NaiveDate,
    ) -> Result<RefundEligibility, AppError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

        let refunds = self.store.list_refunds_for_booking(booking.id).await?;
        Ok(check_eligibility(&booking, &refunds, today))
    }

    /// Create a pending refund and flag the booking `refund_requested`.
    /// Eligibility is decided by the store under the booking's row lock.
    #[instrument(skip(self, reason))]
    pub async fn request_refund(
        &self,
        user_id: Uuid,
        booking_id: i64,
        reason: String,
        today: NaiveDate,
    ) -> Result<RefundReceipt, RefundError> {
        let input = NewRefund {
            user_id,
            booking_id,
            reason,
            today,
        };

        match self.store.create_refund_request(input).await {
            Ok(RefundWrite::Created {
                refund,
                eligibility,
            }) => {
                info!(
                    booking_id,
                    refund_id = refund.id,
                    refund_percentage = refund.refund_percentage,
                    "Refund requested"
                );
                record_refund_request("created");
                Ok(RefundReceipt {
                    refund,
                    eligibility,
                })
            }
            Ok(RefundWrite::Ineligible(eligibility)) => {
                info!(booking_id, reason = %eligibility.message, "Refund request rejected");
                record_refund_request("ineligible");
                Err(RefundError::Ineligible(eligibility.message))
            }
            Ok(RefundWrite::BookingNotFound) => {
                warn!(booking_id, "Refund requested for unknown booking");
                record_refund_request("not_found");
                Err(RefundError::BookingNotFound)
            }
            Err(e) => {
                error!(booking_id, error = %e, "Refund request failed");
                record_refund_request("error");
                Err(RefundError::Store(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use crate::services::eligibility::{MSG_ALREADY_REQUESTED, MSG_VISIT_DATE_PASSED};
    use crate::services::store::InMemoryStore;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, RefundService) {
        let store = Arc::new(InMemoryStore::new());
        let service = RefundService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn tiered_refund_is_created() {
        let (store, service) = setup();
        let user = Uuid::new_v4();
        let booking = store
            .insert_booking(user, 2, today() + Duration::days(4), Decimal::new(300_000, 0), BookingStatus::Confirmed)
            .unwrap();

        let receipt = service
            .request_refund(user, booking.id, "schedule change".to_string(), today())
            .await
            .unwrap();

        assert_eq!(receipt.refund.refund_percentage, 50);
        assert_eq!(receipt.refund.refund_amount, Decimal::new(150_000, 0));
        assert_eq!(receipt.refund.status, "pending");
        assert_eq!(receipt.eligibility.days_until_visit, 4);
    }

    #[tokio::test]
    async fn second_request_is_ineligible() {
        let (store, service) = setup();
        let user = Uuid::new_v4();
        let booking = store
            .insert_booking(user, 2, today() + Duration::days(30), Decimal::new(100_000, 0), BookingStatus::Paid)
            .unwrap();

        service
            .request_refund(user, booking.id, "first".to_string(), today())
            .await
            .unwrap();
        let err = service
            .request_refund(user, booking.id, "second".to_string(), today())
            .await
            .unwrap_err();

        // The first request already moved the booking out of `paid`.
        assert!(matches!(err, RefundError::Ineligible(_)));
        assert_eq!(store.refunds().len(), 1);
    }

    #[tokio::test]
    async fn eligibility_reports_open_request() {
        let (store, service) = setup();
        let user = Uuid::new_v4();
        let booking = store
            .insert_booking(user, 2, today() + Duration::days(30), Decimal::new(100_000, 0), BookingStatus::Paid)
            .unwrap();
        service
            .request_refund(user, booking.id, "first".to_string(), today())
            .await
            .unwrap();

        // Booking is refund_requested now, so the status rule fires first.
        let result = service.eligibility(user, booking.id, today()).await.unwrap();
        assert!(!result.eligible);
        assert_ne!(result.message, MSG_ALREADY_REQUESTED);
    }

    #[tokio::test]
    async fn same_day_visit_is_ineligible() {
        let (store, service) = setup();
        let user = Uuid::new_v4();
        let booking = store
            .insert_booking(user, 2, today(), Decimal::new(100_000, 0), BookingStatus::Paid)
            .unwrap();

        let err = service
            .request_refund(user, booking.id, "x".to_string(), today())
            .await
            .unwrap_err();
        assert!(matches!(err, RefundError::Ineligible(msg) if msg == MSG_VISIT_DATE_PASSED));
    }

    #[tokio::test]
    async fn foreign_booking_is_not_found() {
        let (store, service) = setup();
        let booking = store
            .insert_booking(Uuid::new_v4(), 2, today() + Duration::days(9), Decimal::ONE, BookingStatus::Paid)
            .unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            service.eligibility(stranger, booking.id, today()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.request_refund(stranger, booking.id, "x".to_string(), today()).await,
            Err(RefundError::BookingNotFound)
        ));
    }
}
