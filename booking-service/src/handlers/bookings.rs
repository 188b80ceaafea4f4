//! The caller's bookings.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{BookingListResponse, BookingResponse, EligibilityResponse};
use crate::middleware::UserContext;
use crate::models::CancelOutcome;
use crate::startup::AppState;

/// Upcoming bookings. Paid bookings whose visit date has passed are moved to
/// `used` first, so they show up in history instead.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_active(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<Json<BookingListResponse>, AppError> {
    let today = state.clock.today();

    let moved = state.store.mark_past_bookings_used(user.user_id, today).await?;
    if moved > 0 {
        tracing::info!(moved, "Past bookings marked as used");
    }

    let bookings = state.store.list_active_bookings(user.user_id, today).await?;
    Ok(Json(BookingListResponse {
        success: true,
        data: bookings,
    }))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_history(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<Json<BookingListResponse>, AppError> {
    let bookings = state.store.list_booking_history(user.user_id).await?;
    Ok(Json(BookingListResponse {
        success: true,
        data: bookings,
    }))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn cancel(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingResponse>, AppError> {
    match state.store.cancel_booking(booking_id, user.user_id).await? {
        CancelOutcome::Cancelled(booking) => {
            tracing::info!(booking_id, "Booking cancelled");
            Ok(Json(BookingResponse {
                success: true,
                message: "Booking cancelled".to_string(),
                data: booking,
            }))
        }
        CancelOutcome::NotCancellable(status) => Err(AppError::Conflict(anyhow::anyhow!(
            "Booking cannot be cancelled in status {}",
            status
        ))),
        CancelOutcome::NotFound => Err(AppError::NotFound(anyhow::anyhow!("Booking not found"))),
    }
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn refund_eligibility(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<i64>,
) -> Result<Json<EligibilityResponse>, AppError> {
    let eligibility = state
        .refunds
        .eligibility(user.user_id, booking_id, state.clock.today())
        .await?;

    Ok(Json(EligibilityResponse {
        success: true,
        data: eligibility,
    }))
}
