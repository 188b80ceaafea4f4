use booking_service::config::{BookingConfig, SERVICE_NAME};
use booking_service::services::init_metrics;
use booking_service::startup::Application;
use service_core::error::set_redact_details;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = BookingConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(SERVICE_NAME, &config.log_level, config.otlp_endpoint.as_deref());
    set_redact_details(config.is_production());

    // Must run before any metric is recorded
    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(format!("Metrics initialization error: {}", e))
    })?;

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
