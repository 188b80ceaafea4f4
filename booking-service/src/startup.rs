//! Application startup and lifecycle management.

use crate::config::{BookingConfig, CorsConfig, SERVICE_NAME};
use crate::handlers;
use crate::services::{
    BookingStore, BusinessClock, GeminiTextProvider, MidtransClient, NotificationReconciler,
    PaymentGateway, PgStore, RefundService, TextProvider,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    ip_rate_limit_middleware, metrics_middleware, request_id_middleware, IpRateLimiter,
    LocalRateLimitStore, RedisRateLimitStore, SharedRateLimiter, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub reconciler: NotificationReconciler,
    pub refunds: RefundService,
    pub text_provider: Arc<dyn TextProvider>,
    pub rate_limiter: IpRateLimiter,
    pub clock: BusinessClock,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        text_provider: Arc<dyn TextProvider>,
        rate_limiter: IpRateLimiter,
        clock: BusinessClock,
    ) -> Self {
        Self {
            reconciler: NotificationReconciler::new(store.clone(), gateway.clone()),
            refunds: RefundService::new(store.clone()),
            store,
            gateway,
            text_provider,
            rate_limiter,
            clock,
        }
    }
}

pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let ai_routes = post(handlers::ai::generate)
        .fallback(handlers::method_not_allowed)
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        // Payments
        .route(
            "/api/payments/transactions",
            post(handlers::payments::create_transaction).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/payments/status",
            get(handlers::payments::transaction_status).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/payments/notification",
            post(handlers::payments::notification).fallback(handlers::method_not_allowed),
        )
        // Bookings and refunds (caller identified by X-User-ID)
        .route("/api/bookings", get(handlers::bookings::list_active))
        .route("/api/bookings/history", get(handlers::bookings::list_history))
        .route("/api/bookings/:id/cancel", post(handlers::bookings::cancel))
        .route(
            "/api/bookings/:id/refund-eligibility",
            get(handlers::bookings::refund_eligibility),
        )
        .route(
            "/api/bookings/:id/refunds",
            post(handlers::refunds::request_refund),
        )
        .route("/api/refunds", get(handlers::refunds::list_refunds))
        // Generative text proxy
        .route("/api/ai/generate", ai_routes)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(cors))
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .allow_credentials(true)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: BookingConfig) -> Result<Self, AppError> {
        let db = &config.database;
        let store = if db.run_migrations {
            let store = PgStore::connect(
                db.url.expose_secret(),
                db.max_connections,
                db.min_connections,
            )
            .await?;
            store.run_migrations().await?;
            store
        } else {
            PgStore::connect_lazy(db.url.expose_secret(), db.max_connections)?
        };

        let gateway = MidtransClient::new(config.midtrans.clone())?;
        if gateway.is_configured() {
            tracing::info!(
                production = config.midtrans.is_production,
                "Midtrans client initialized"
            );
        } else {
            tracing::warn!("MIDTRANS_SERVER_KEY not configured - payment features will fail");
        }

        let text_provider = GeminiTextProvider::new(config.gemini.clone())?;
        if !text_provider.is_configured() {
            tracing::warn!("GEMINI_API_KEY not configured - /api/ai/generate will fail");
        }

        let window = Duration::from_secs(config.rate_limit.window_seconds);
        let limiter_store: SharedRateLimiter = match &config.redis_url {
            Some(url) => {
                tracing::info!("Using Redis for AI rate limiting");
                Arc::new(
                    RedisRateLimitStore::connect(
                        url.expose_secret(),
                        "ratelimit:ai",
                        config.rate_limit.max_requests,
                        window,
                    )
                    .await?,
                )
            }
            None => {
                tracing::warn!(
                    "REDIS_URL not set - AI rate limiting is per process and resets on restart"
                );
                Arc::new(LocalRateLimitStore::new(config.rate_limit.max_requests, window)?)
            }
        };
        if !config.rate_limit.trust_forwarded_for {
            tracing::info!("X-Forwarded-For ignored for rate limiting; keying by peer address");
        }
        let rate_limiter = IpRateLimiter::new(limiter_store, config.rate_limit.trust_forwarded_for);

        let state = AppState::new(
            Arc::new(store),
            Arc::new(gateway),
            Arc::new(text_provider),
            rate_limiter,
            BusinessClock::with_offset(config.utc_offset_hours),
        );
        let router = build_router(state, &config.cors);

        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(service = SERVICE_NAME, port, "Booking service listening");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
