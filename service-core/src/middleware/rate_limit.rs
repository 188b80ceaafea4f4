use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use redis::aio::ConnectionManager;
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// Idle keys are swept from the local limiter once per this many checks.
const PRUNE_EVERY: u64 = 1024;

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Counter store consulted once per request, keyed by client identity.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, AppError>;
}

pub type SharedRateLimiter = Arc<dyn RateLimitStore>;

/// Middleware state: the counter store plus how the client is identified.
#[derive(Clone)]
pub struct IpRateLimiter {
    store: SharedRateLimiter,
    trust_forwarded_for: bool,
}

impl IpRateLimiter {
    /// `trust_forwarded_for` should only be set when a proxy in front of the
    /// service overwrites `X-Forwarded-For`; otherwise clients pick their own key.
    pub fn new(store: SharedRateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            store,
            trust_forwarded_for,
        }
    }
}

/// Fixed-window counter in Redis (`INCR` + `EXPIRE`), shared by all instances.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
    prefix: String,
    max_requests: u32,
    window_secs: u64,
}

impl RedisRateLimitStore {
    pub async fn connect(
        redis_url: &str,
        prefix: &str,
        max_requests: u32,
        window: Duration,
    ) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            max_requests: max_requests.max(1),
            window_secs: window.as_secs().max(1),
        })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, AppError> {
        let key = format!("{}:{}", self.prefix, key);
        let mut conn = self.conn.clone();

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1u64)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        // First hit in a window (or a key that lost its expiry) starts the window.
        let ttl = if ttl < 0 {
            let _: () = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.window_secs)
                .query_async(&mut conn)
                .await?;
            self.window_secs as i64
        } else {
            ttl
        };

        if count > self.max_requests as u64 {
            Ok(RateLimitDecision::Limited {
                retry_after_secs: ttl.max(1) as u64,
            })
        } else {
            Ok(RateLimitDecision::Allowed)
        }
    }
}

/// Process-local keyed limiter. Counters are per instance and reset on
/// restart, so the effective limit grows with the number of replicas.
pub struct LocalRateLimitStore {
    limiter: RateLimiter<String, DashMapStateStore<String>, DefaultClock>,
    checks: AtomicU64,
}

impl LocalRateLimitStore {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, AppError> {
        let burst = NonZeroU32::new(max_requests).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("rate limit must allow at least one request"))
        })?;
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("rate limit window is empty")))?
            .allow_burst(burst);

        Ok(Self {
            limiter: RateLimiter::dashmap(quota),
            checks: AtomicU64::new(0),
        })
    }

    /// Drop keys whose window has fully elapsed.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of client keys currently held in memory.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

#[async_trait]
impl RateLimitStore for LocalRateLimitStore {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, AppError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        match self.limiter.check_key(&key.to_string()) {
            Ok(_) => Ok(RateLimitDecision::Allowed),
            Err(negative) => {
                let wait = negative.wait_time_from(DefaultClock::default().now());
                Ok(RateLimitDecision::Limited {
                    retry_after_secs: (wait.as_millis() as u64).div_ceil(1000).max(1),
                })
            }
        }
    }
}

/// Peer address, or the first `X-Forwarded-For` entry when the header comes
/// from a trusted proxy.
pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| request.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-client-IP rate limiting. Store failures let the request through.
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request, limiter.trust_forwarded_for);

    match limiter.store.check(&ip).await {
        Ok(RateLimitDecision::Allowed) => Ok(next.run(request).await),
        Ok(RateLimitDecision::Limited { retry_after_secs }) => {
            tracing::warn!(client_ip = %ip, retry_after = retry_after_secs, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                format!(
                    "Rate limit exceeded. Try again in {} seconds.",
                    retry_after_secs
                ),
                Some(retry_after_secs),
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit store unavailable, allowing request");
            Ok(next.run(request).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn local_store_limits_after_burst() {
        let store = LocalRateLimitStore::new(3, Duration::from_secs(60)).unwrap();

        for _ in 0..3 {
            assert_eq!(store.check("10.0.0.1").await.unwrap(), RateLimitDecision::Allowed);
        }

        match store.check("10.0.0.1").await.unwrap() {
            RateLimitDecision::Limited { retry_after_secs } => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 20);
            }
            other => panic!("expected limit, got {:?}", other),
        }

        assert_eq!(store.check("10.0.0.2").await.unwrap(), RateLimitDecision::Allowed);
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(LocalRateLimitStore::new(0, Duration::from_secs(60)).is_err());
    }

    #[tokio::test]
    async fn idle_keys_are_pruned() {
        let store = LocalRateLimitStore::new(1, Duration::from_millis(50)).unwrap();

        for i in 0..10 {
            store.check(&format!("10.0.0.{}", i)).await.unwrap();
        }
        assert_eq!(store.tracked_keys(), 10);

        tokio::time::sleep(Duration::from_millis(150)).await;
        store.prune();
        assert_eq!(store.tracked_keys(), 0);
    }

    #[test]
    fn client_ip_uses_forwarded_header_only_when_trusted() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request, true), "203.0.113.7");
        assert_eq!(client_ip(&request, false), "unknown");

        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4000))));
        assert_eq!(client_ip(&request, false), "192.168.1.9");
        assert_eq!(client_ip(&request, true), "203.0.113.7");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request, true), "unknown");
    }
}
