pub mod booking;
pub mod refund;
pub mod transaction;

pub use booking::{Booking, BookingStatus, CancelOutcome, NewBooking};
pub use refund::{NewPurchase, NewRefund, Purchase, Refund, RefundStatus};
pub use transaction::{
    NewTransaction, Transaction, TransactionStatus, TransactionUpdate, UpdateOutcome,
};
