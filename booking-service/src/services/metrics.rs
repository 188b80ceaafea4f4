//! Prometheus metrics for booking-service.
//!
//! HTTP metrics go through the `metrics` facade and the Prometheus recorder;
//! domain counters live in a dedicated `prometheus` registry. Both are
//! rendered together at `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use service_core::error::AppError;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Webhook notifications by mapped status.
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "booking_notifications_total",
            "Payment notifications processed by mapped status",
        ),
        &["status"],
    )
    .expect("Failed to create booking_notifications_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register booking_notifications_total");
    counter
});

/// Refund requests by outcome: created, ineligible, not_found, error.
pub static REFUND_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("booking_refund_requests_total", "Refund requests by outcome"),
        &["outcome"],
    )
    .expect("Failed to create booking_refund_requests_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register booking_refund_requests_total");
    counter
});

/// Best-effort writes that were logged and dropped.
pub static DERIVATIVE_WRITE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "booking_derivative_write_failures_total",
            "Best-effort writes that failed after a payment notification",
        ),
        &["kind"], // transaction_update, booking, purchase
    )
    .expect("Failed to create booking_derivative_write_failures_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register booking_derivative_write_failures_total");
    counter
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "booking_db_query_duration_seconds",
            "Database query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create booking_db_query_duration_seconds");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register booking_db_query_duration_seconds");
    histogram
});

/// Install the global Prometheus recorder. Safe to call more than once.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
    })?;
    let _ = METRICS_HANDLE.set(handle);

    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&REFUND_REQUESTS_TOTAL);
    Lazy::force(&DERIVATIVE_WRITE_FAILURES_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer).ok();
    if let Ok(domain) = String::from_utf8(buffer) {
        output.push_str(&domain);
    }

    output
}

pub fn record_notification(status: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_refund_request(outcome: &str) {
    REFUND_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_derivative_failure(kind: &str) {
    DERIVATIVE_WRITE_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}
