//! PostgreSQL implementation of [`BookingStore`].

use super::{BookingStore, RefundWrite};
use crate::models::{
    Booking, BookingStatus, CancelOutcome, NewBooking, NewPurchase, NewRefund, NewTransaction,
    Purchase, Refund, RefundStatus, Transaction, TransactionUpdate, UpdateOutcome,
};
use crate::services::eligibility::{check_eligibility, RefundEligibility, MSG_ALREADY_REQUESTED};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use service_core::utils::mask_order_id;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, order_id, user_id, booking_type, status, gross_amount, \
    currency, customer_name, customer_email, customer_phone, snap_token, redirect_url, \
    trip_data_id, item_details, visit_date, payment_type, fraud_status, gateway_response, \
    created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, order_id, user_id, destination_id, visit_date, quantity, \
    total_price, status, created_at, updated_at";

const REFUND_COLUMNS: &str = "id, user_id, booking_id, ticket_id, reason, refund_amount, \
    refund_percentage, status, requested_at, processed_at";

const PURCHASE_COLUMNS: &str =
    "id, user_id, booking_id, ticket_id, amount, payment_method, status, created_at";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "booking-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Pool that opens connections on first use. `/ready` reports the
    /// database as unavailable until one succeeds.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)
            .map_err(db_error("Invalid database URL"))?;

        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PgStore {
    #[instrument(skip(self, input), fields(order_id = %mask_order_id(&input.order_id)))]
    async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transaction"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO transactions (
                order_id, user_id, booking_type, status, gross_amount, currency,
                customer_name, customer_email, customer_phone, snap_token, redirect_url,
                trip_data_id, item_details, visit_date
            )
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let transaction = sqlx::query_as::<_, Transaction>(&sql)
            .bind(&input.order_id)
            .bind(input.user_id)
            .bind(&input.booking_type)
            .bind(input.gross_amount)
            .bind(&input.currency)
            .bind(&input.customer_name)
            .bind(&input.customer_email)
            .bind(&input.customer_phone)
            .bind(&input.snap_token)
            .bind(&input.redirect_url)
            .bind(input.trip_data_id)
            .bind(&input.item_details)
            .bind(&input.visit_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!("Order already exists"))
                } else {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to create transaction: {}", e))
                }
            })?;

        timer.observe_duration();

        info!(transaction_id = transaction.id, "Transaction recorded");

        Ok(transaction)
    }

    #[instrument(skip(self), fields(order_id = %mask_order_id(order_id)))]
    async fn get_transaction_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE order_id = $1",
            TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get transaction"))
    }

    #[instrument(skip(self, update), fields(order_id = %mask_order_id(order_id), status = %update.status))]
    async fn apply_transaction_status(
        &self,
        order_id: &str,
        update: TransactionUpdate,
    ) -> Result<UpdateOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_transaction_status"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2,
                payment_type = COALESCE($3, payment_type),
                fraud_status = COALESCE($4, fraud_status),
                gateway_response = $5,
                updated_at = NOW()
            WHERE order_id = $1
              AND (status <> 'success' OR $2 = 'success')
            "#,
        )
        .bind(order_id)
        .bind(update.status.as_str())
        .bind(&update.payment_type)
        .bind(&update.fraud_status)
        .bind(&update.gateway_response)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update transaction"))?;

        let outcome = if result.rows_affected() > 0 {
            UpdateOutcome::Updated
        } else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM transactions WHERE order_id = $1)")
                    .bind(order_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_error("Failed to look up transaction"))?;
            if exists {
                UpdateOutcome::Unchanged
            } else {
                UpdateOutcome::NotFound
            }
        };

        timer.observe_duration();

        Ok(outcome)
    }

    #[instrument(skip(self, input), fields(order_id = %mask_order_id(&input.order_id)))]
    async fn create_booking_for_order(&self, input: NewBooking) -> Result<Option<Booking>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_booking"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO bookings (order_id, user_id, destination_id, visit_date, quantity, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(&input.order_id)
            .bind(input.user_id)
            .bind(input.destination_id)
            .bind(input.visit_date)
            .bind(input.quantity)
            .bind(input.total_price)
            .bind(input.status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to create booking"))?;

        timer.observe_duration();

        Ok(booking)
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    async fn create_purchase(&self, input: NewPurchase) -> Result<Purchase, AppError> {
        let sql = format!(
            r#"
            INSERT INTO purchases (user_id, booking_id, ticket_id, amount, payment_method, status)
            VALUES ($1, $2, NULL, $3, $4, 'paid')
            RETURNING {}
            "#,
            PURCHASE_COLUMNS
        );

        sqlx::query_as::<_, Purchase>(&sql)
            .bind(input.user_id)
            .bind(input.booking_id)
            .bind(input.amount)
            .bind(&input.payment_method)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create purchase"))
    }

    #[instrument(skip(self))]
    async fn get_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get booking"))
    }

    #[instrument(skip(self))]
    async fn list_refunds_for_booking(&self, booking_id: i64) -> Result<Vec<Refund>, AppError> {
        let sql = format!(
            "SELECT {} FROM refunds WHERE booking_id = $1 ORDER BY requested_at DESC",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, Refund>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list refunds"))
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id, booking_id = input.booking_id))]
    async fn create_refund_request(&self, input: NewRefund) -> Result<RefundWrite, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_refund_request"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let sql = format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(input.booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to lock booking"))?;

        let Some(booking) = booking.filter(|b| b.user_id == input.user_id) else {
            return Ok(RefundWrite::BookingNotFound);
        };

        let sql = format!("SELECT {} FROM refunds WHERE booking_id = $1", REFUND_COLUMNS);
        let refunds = sqlx::query_as::<_, Refund>(&sql)
            .bind(booking.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("Failed to list refunds"))?;

        let eligibility = check_eligibility(&booking, &refunds, input.today);
        if !eligibility.eligible {
            return Ok(RefundWrite::Ineligible(eligibility));
        }

        let sql = format!(
            r#"
            INSERT INTO refunds (user_id, booking_id, ticket_id, reason, refund_amount, refund_percentage, status)
            VALUES ($1, $2, NULL, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REFUND_COLUMNS
        );
        let inserted = sqlx::query_as::<_, Refund>(&sql)
            .bind(input.user_id)
            .bind(booking.id)
            .bind(&input.reason)
            .bind(eligibility.refund_amount)
            .bind(eligibility.refund_percentage)
            .bind(RefundStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await;

        let refund = match inserted {
            Ok(refund) => refund,
            // Lost a race with a concurrent request for the same booking.
            Err(e) if is_unique_violation(&e) => {
                return Ok(RefundWrite::Ineligible(RefundEligibility {
                    eligible: false,
                    message: MSG_ALREADY_REQUESTED.to_string(),
                    refund_percentage: 0,
                    refund_amount: rust_decimal::Decimal::ZERO,
                    ..eligibility
                }));
            }
            Err(e) => return Err(db_error("Failed to create refund")(e)),
        };

        sqlx::query("UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(booking.id)
            .bind(BookingStatus::RefundRequested.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to update booking status"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit refund request"))?;

        timer.observe_duration();

        info!(refund_id = refund.id, amount = %refund.refund_amount, "Refund request recorded");

        Ok(RefundWrite::Created {
            refund,
            eligibility,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn mark_past_bookings_used(&self, user_id: Uuid, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'used', updated_at = NOW()
            WHERE user_id = $1
              AND status IN ('paid', 'confirmed')
              AND visit_date < $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark bookings used"))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_active_bookings(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE user_id = $1
              AND status IN ('pending_payment', 'paid', 'confirmed')
              AND visit_date >= $2
            ORDER BY visit_date ASC, id ASC
            "#,
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .bind(today)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list bookings"))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_booking_history(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE user_id = $1
              AND status IN ('used', 'refunded', 'cancelled')
            ORDER BY visit_date DESC, id DESC
            "#,
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list booking history"))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn cancel_booking(&self, booking_id: i64, user_id: Uuid) -> Result<CancelOutcome, AppError> {
        let sql = format!(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1
              AND user_id = $2
              AND status IN ('pending_payment', 'paid', 'confirmed')
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let cancelled = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to cancel booking"))?;

        if let Some(booking) = cancelled {
            return Ok(CancelOutcome::Cancelled(booking));
        }

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1 AND user_id = $2")
                .bind(booking_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to look up booking"))?;

        Ok(match status {
            Some(status) => CancelOutcome::NotCancellable(status),
            None => CancelOutcome::NotFound,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_user_refunds(&self, user_id: Uuid) -> Result<Vec<Refund>, AppError> {
        let sql = format!(
            "SELECT {} FROM refunds WHERE user_id = $1 ORDER BY requested_at DESC, id DESC",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, Refund>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list refunds"))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Health check failed"))?;
        Ok(())
    }
}
