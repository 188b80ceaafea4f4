//! Gateway status vocabulary to internal transaction status.

use crate::models::TransactionStatus;

/// Map Midtrans `transaction_status` x `fraud_status` to an internal status.
///
/// Total: unknown values fall through to `Pending`.
pub fn map_status(transaction_status: &str, fraud_status: Option<&str>) -> TransactionStatus {
    match transaction_status {
        "capture" => match fraud_status {
            Some("accept") => TransactionStatus::Success,
            Some("challenge") => TransactionStatus::Challenge,
            _ => TransactionStatus::Pending,
        },
        "settlement" => TransactionStatus::Success,
        "cancel" | "deny" | "expire" => TransactionStatus::Failed,
        _ => TransactionStatus::Pending,
    }
}
