pub mod metrics;
pub mod rate_limit;
pub mod tracing;

pub use metrics::metrics_middleware;
pub use rate_limit::{
    IpRateLimiter, LocalRateLimitStore, RateLimitDecision, RateLimitStore, RedisRateLimitStore,
    SharedRateLimiter, client_ip, ip_rate_limit_middleware,
};
pub use tracing::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
