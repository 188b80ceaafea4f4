//! Checkout, status lookup and the gateway webhook.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::error::AppError;
use service_core::utils::{mask_email, mask_order_id};
use validator::Validate;

use crate::dtos::{
    CreateTransactionRequest, CreateTransactionResponse, NotificationQuery, NotificationResponse,
    StatusQuery, StatusResponse, MSG_MISSING_CHECKOUT_FIELDS,
};
use crate::models::NewTransaction;
use crate::services::gateway::{
    validate_order_id, whole_amount, CheckoutRequest, CustomerDetails, GatewayError, ItemDetail,
};
use crate::services::status_mapper::map_status;
use crate::startup::AppState;

const CURRENCY: &str = "IDR";
const MSG_FRACTIONAL_AMOUNT: &str = "grossAmount and item prices must be whole rupiah amounts";

/// Open a hosted checkout session and record the pending transaction.
#[tracing::instrument(skip(state, request))]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<CreateTransactionResponse>, AppError> {
    let missing = || AppError::BadRequest(anyhow::anyhow!(MSG_MISSING_CHECKOUT_FIELDS));

    let order_id = request
        .order_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;
    validate_order_id(&order_id)?;
    let gross_amount = request
        .gross_amount
        .filter(|a| *a > Decimal::ZERO)
        .ok_or_else(missing)?;
    let customer = request.customer_details.ok_or_else(missing)?;
    customer.validate()?;

    let fractional = || AppError::BadRequest(anyhow::anyhow!(MSG_FRACTIONAL_AMOUNT));
    whole_amount(gross_amount).map_err(|_| fractional())?;
    for item in request.item_details.iter().flatten() {
        whole_amount(item.price).map_err(|_| fractional())?;
    }

    let metadata = request.metadata;
    if let Some(date) = metadata.visit_date.as_deref() {
        let date_part = date.get(..10).unwrap_or(date);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("metadata.visitDate must be an ISO date"))
        })?;
    }

    if state.store.get_transaction_by_order_id(&order_id).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Order already exists")));
    }

    tracing::info!(
        order_id = %mask_order_id(&order_id),
        gross_amount = %gross_amount,
        customer_email = %mask_email(&customer.email),
        "Creating checkout transaction"
    );

    let items: Vec<ItemDetail> = request
        .item_details
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|item| ItemDetail {
            id: item.id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        })
        .collect();

    let checkout = CheckoutRequest {
        order_id: order_id.clone(),
        gross_amount,
        customer: CustomerDetails {
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
        },
        items,
        visit_date: metadata.visit_date.clone(),
        destination_id: metadata.trip_data_id,
        booking_type: metadata.booking_type.clone(),
    };

    let session = state.gateway.create_transaction(&checkout).await.map_err(|e| {
        tracing::error!(order_id = %mask_order_id(&order_id), error = %e, "Failed to create checkout");
        AppError::from(e)
    })?;

    let customer_name = match customer.last_name.as_deref().filter(|s| !s.is_empty()) {
        Some(last) => format!("{} {}", customer.first_name, last),
        None => customer.first_name.clone(),
    };

    state
        .store
        .create_transaction(NewTransaction {
            order_id: order_id.clone(),
            user_id: metadata.user_id,
            booking_type: Some(metadata.booking_type.unwrap_or_else(|| "trip".to_string())),
            gross_amount,
            currency: CURRENCY.to_string(),
            customer_name: Some(customer_name),
            customer_email: Some(customer.email),
            customer_phone: customer.phone,
            snap_token: Some(session.token.clone()),
            redirect_url: Some(session.redirect_url.clone()),
            trip_data_id: metadata.trip_data_id,
            item_details: request
                .item_details
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| AppError::InternalError(e.into()))?,
            visit_date: metadata.visit_date,
        })
        .await?;

    Ok(Json(CreateTransactionResponse {
        success: true,
        token: session.token,
        redirect_url: session.redirect_url,
        order_id,
        client_key: session.client_key,
    }))
}

/// Authoritative status from the gateway; the local row follows it.
#[tracing::instrument(skip(state, query))]
pub async fn transaction_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let order_id = query
        .order_id
        .map(|s| s.trim().to_string())
        .filter(|s| validate_order_id(s).is_ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing or invalid orderId parameter")))?;

    let status = state.gateway.transaction_status(&order_id).await?;
    let mapped = map_status(&status.transaction_status, status.fraud_status.as_deref());
    state.reconciler.apply_status(&status, mapped).await;

    Ok(Json(StatusResponse {
        success: true,
        data: status.into(),
    }))
}

/// Gateway webhook. Acknowledged with 200 once the payload is verified;
/// booking writes after that never fail the delivery.
#[tracing::instrument(skip(state, query, body))]
pub async fn notification(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    body: Bytes,
) -> Result<Json<NotificationResponse>, AppError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body")))?;
    let kind = query.kind.as_deref().unwrap_or("transaction");

    let order_id = payload.get("order_id").and_then(Value::as_str).unwrap_or("");
    tracing::info!(
        notification_type = kind,
        order_id = %mask_order_id(order_id),
        "Notification received"
    );

    match kind {
        "recurring" => {
            tracing::info!(
                subscription_id = payload.get("subscription_id").and_then(serde_json::Value::as_str).unwrap_or("-"),
                transaction_status = payload.get("transaction_status").and_then(serde_json::Value::as_str).unwrap_or("-"),
                order_id = %mask_order_id(order_id),
                payment_type = payload.get("payment_type").and_then(serde_json::Value::as_str).unwrap_or("-"),
                "Recurring notification"
            );
            Ok(Json(NotificationResponse {
                success: true,
                message: "Recurring notification processed".to_string(),
                status: None,
            }))
        }
        "pay-account" => {
            tracing::info!(
                account_id = payload.get("account_id").and_then(serde_json::Value::as_str).unwrap_or("-"),
                account_status = payload.get("account_status").and_then(serde_json::Value::as_str).unwrap_or("-"),
                payment_type = payload.get("payment_type").and_then(serde_json::Value::as_str).unwrap_or("-"),
                "Pay Account notification"
            );
            Ok(Json(NotificationResponse {
                success: true,
                message: "Pay Account notification processed".to_string(),
                status: None,
            }))
        }
        _ => {
            let outcome = match state.reconciler.reconcile(&payload).await {
                Ok(outcome) => outcome,
                // Acknowledge so the gateway stops retrying an order it does not know.
                Err(GatewayError::NotFound) => {
                    tracing::warn!(
                        order_id = %mask_order_id(order_id),
                        "Notification for transaction unknown to the gateway, ignoring"
                    );
                    return Ok(Json(NotificationResponse {
                        success: true,
                        message: "Transaction not found at gateway, notification ignored"
                            .to_string(),
                        status: None,
                    }));
                }
                Err(e @ (GatewayError::InvalidSignature | GatewayError::InvalidPayload(_))) => {
                    return Err(AppError::from(e));
                }
                Err(other) => {
                    return Err(AppError::InternalError(anyhow::anyhow!(
                        "Failed to process transaction notification: {}",
                        other
                    )));
                }
            };

            Ok(Json(NotificationResponse {
                success: true,
                message: "Transaction notification processed".to_string(),
                status: Some(outcome.status.as_str().to_string()),
            }))
        }
    }
}
