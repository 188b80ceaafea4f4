//! Request and response bodies. JSON field names are camelCase to match the
//! web client.

use crate::models::{Booking, Refund};
use crate::services::eligibility::RefundEligibility;
use crate::services::gateway::GatewayStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

pub const MSG_MISSING_CHECKOUT_FIELDS: &str =
    "Missing required fields: orderId, grossAmount, customerDetails";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub order_id: Option<String>,
    pub gross_amount: Option<Decimal>,
    pub customer_details: Option<CustomerDetailsDto>,
    pub item_details: Option<Vec<ItemDetailDto>>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetailsDto {
    #[validate(length(min = 1, message = "firstName cannot be empty"))]
    pub first_name: String,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetailDto {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutMetadata {
    pub trip_data_id: Option<i64>,
    pub user_id: Option<Uuid>,
    pub booking_type: Option<String>,
    /// ISO date of the visit (`YYYY-MM-DD`).
    pub visit_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    pub success: bool,
    pub token: String,
    pub redirect_url: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusData {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub gross_amount: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_time: Option<String>,
    pub status_code: Option<String>,
}

impl From<GatewayStatus> for TransactionStatusData {
    fn from(status: GatewayStatus) -> Self {
        Self {
            order_id: status.order_id,
            transaction_status: status.transaction_status,
            fraud_status: status.fraud_status,
            gross_amount: status.gross_amount,
            payment_type: status.payment_type,
            transaction_time: status.transaction_time,
            status_code: status.status_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: TransactionStatusData,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub success: bool,
    pub data: Vec<Booking>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub success: bool,
    pub message: String,
    pub data: Booking,
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub success: bool,
    pub data: RefundEligibility,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequestBody {
    #[validate(length(min = 1, max = 1000, message = "Reason must be 1 to 1000 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundCreatedResponse {
    pub success: bool,
    pub message: String,
    pub refund_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub refund_amount: Decimal,
    pub refund_percentage: i32,
}

#[derive(Debug, Serialize)]
pub struct RefundListResponse {
    pub success: bool,
    pub data: Vec<Refund>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub raw: Value,
}
