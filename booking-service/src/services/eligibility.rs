//! Refund eligibility calculation.
//!
//! The single implementation of the refund policy. The HTTP endpoint, the
//! refund service and the store's locked re-check all go through
//! [`check_eligibility`].

use crate::models::{Booking, Refund};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

pub const MSG_STATUS_NOT_ELIGIBLE: &str =
    "Booking status is not eligible for a refund. Only paid or confirmed bookings can be refunded.";
pub const MSG_VISIT_DATE_PASSED: &str = "Visit date has passed. Refunds are no longer available.";
pub const MSG_ALREADY_REQUESTED: &str = "A refund has already been requested for this booking";

/// Outcome of the eligibility rules for one booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundEligibility {
    pub eligible: bool,
    pub message: String,
    pub refund_percentage: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub refund_amount: Decimal,
    pub days_until_visit: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_amount: Decimal,
}

impl RefundEligibility {
    fn ineligible(message: &str, days_until_visit: i64, original_amount: Decimal) -> Self {
        Self {
            eligible: false,
            message: message.to_string(),
            refund_percentage: 0,
            refund_amount: Decimal::ZERO,
            days_until_visit,
            original_amount,
        }
    }
}

/// Percentage tier for a visit `days_until_visit` days away (at least 1).
pub fn refund_tier(days_until_visit: i64) -> (i32, &'static str) {
    if days_until_visit >= 7 {
        (100, "Full refund (100%): cancelled 7 or more days before the visit")
    } else if days_until_visit >= 3 {
        (50, "50% refund: cancelled 3 to 6 days before the visit")
    } else {
        (25, "25% refund: cancelled less than 3 days before the visit")
    }
}

/// Rules run in order and the first match wins: status, visit date, open
/// refund, then the percentage tier.
pub fn check_eligibility(booking: &Booking, refunds: &[Refund], today: NaiveDate) -> RefundEligibility {
    let days_until_visit = (booking.visit_date - today).num_days();
    let original_amount = booking.total_price;

    if !booking.status().is_some_and(|s| s.is_paid()) {
        return RefundEligibility::ineligible(MSG_STATUS_NOT_ELIGIBLE, days_until_visit, original_amount);
    }

    if days_until_visit <= 0 {
        return RefundEligibility::ineligible(MSG_VISIT_DATE_PASSED, days_until_visit, original_amount);
    }

    let has_open_request = refunds
        .iter()
        .filter(|r| r.booking_id == Some(booking.id))
        .any(|r| r.status().is_some_and(|s| s.blocks_new_request()));
    if has_open_request {
        return RefundEligibility::ineligible(MSG_ALREADY_REQUESTED, days_until_visit, original_amount);
    }

    let (percentage, message) = refund_tier(days_until_visit);
    let refund_amount = (original_amount * Decimal::from(percentage) / Decimal::ONE_HUNDRED).round_dp(2);

    RefundEligibility {
        eligible: true,
        message: message.to_string(),
        refund_percentage: percentage,
        refund_amount,
        days_until_visit,
        original_amount,
    }
}
