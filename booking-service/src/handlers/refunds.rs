use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{RefundCreatedResponse, RefundListResponse, RefundRequestBody};
use crate::middleware::UserContext;
use crate::startup::AppState;

#[tracing::instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn request_refund(
    State(state): State<AppState>,
    user: UserContext,
    Path(booking_id): Path<i64>,
    Json(body): Json<RefundRequestBody>,
) -> Result<(StatusCode, Json<RefundCreatedResponse>), AppError> {
    body.validate()?;

    let receipt = state
        .refunds
        .request_refund(
            user.user_id,
            booking_id,
            body.reason.trim().to_string(),
            state.clock.today(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RefundCreatedResponse {
            success: true,
            message: receipt.eligibility.message,
            refund_id: receipt.refund.id,
            refund_amount: receipt.refund.refund_amount,
            refund_percentage: receipt.refund.refund_percentage,
        }),
    ))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_refunds(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<Json<RefundListResponse>, AppError> {
    let refunds = state.store.list_user_refunds(user.user_id).await?;
    Ok(Json(RefundListResponse {
        success: true,
        data: refunds,
    }))
}
