//! # Per-Client Rate Limiting
//!
//! Fixed-window rate limiter keyed by client address. The consent and
//! newsletter endpoints are reachable without credentials, so the key is
//! the caller's IP as resolved by [`client_ip`]. Runs before authentication,
//! so rejected credentials count against the caller too.
//!
//! Memory is bounded by [`RateLimitConfig::max_clients`]. Expired buckets
//! are swept once per window.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::error::{ErrorBody, ErrorDetail};
use crate::extractors::client_ip;
use crate::middleware::metrics::ApiMetrics;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration in seconds.
    pub window_secs: u64,
    /// Most clients tracked at once. The oldest bucket is evicted to make
    /// room for a new client.
    pub max_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_secs: 60,
            max_clients: 10_000,
        }
    }
}

/// Per-key rate limit state.
#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

/// Buckets plus the order their keys were first seen.
#[derive(Debug)]
struct Buckets {
    map: HashMap<String, BucketState>,
    order: VecDeque<String>,
    last_sweep: Instant,
}

impl Buckets {
    /// Drop buckets whose window has passed. Runs at most once per window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.last_sweep) < window {
            return;
        }
        self.last_sweep = now;
        self.map.retain(|_, b| now.duration_since(b.window_start) < window);
        let map = &self.map;
        self.order.retain(|k| map.contains_key(k));
    }

    /// Make room for one more key.
    fn evict_oldest(&mut self) {
        while let Some(key) = self.order.pop_front() {
            if self.map.remove(&key).is_some() {
                return;
            }
        }
    }
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<Buckets>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(Buckets {
                map: HashMap::new(),
                order: VecDeque::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Check if a request from the given key should be allowed.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().map.len()
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let window = Duration::from_secs(self.config.window_secs);
        let mut buckets = self.buckets.lock();
        buckets.sweep(now, window);

        if !buckets.map.contains_key(key) {
            if buckets.map.len() >= self.config.max_clients.max(1) {
                buckets.evict_oldest();
            }
            buckets.order.push_back(key.to_string());
        }
        let bucket = buckets.map.entry(key.to_string()).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }
}

/// Middleware that enforces per-client rate limits.
///
/// If the client address cannot be determined, the key defaults to
/// `"anonymous"`.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let key = client_ip(request.headers(), request.extensions())
            .unwrap_or_else(|| "anonymous".to_string());

        if !limiter.check(&key) {
            tracing::warn!(client = %key, "rate limit exceeded");
            if let Some(metrics) = request.extensions().get::<ApiMetrics>() {
                metrics.rate_limited_count.fetch_add(1, Ordering::Relaxed);
            }
            let body = ErrorBody {
                error: ErrorDetail {
                    code: "RATE_LIMITED".to_string(),
                    message: "rate limit exceeded".to_string(),
                    details: None,
                },
            };
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn limiter(max_requests: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window_secs: 60,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let rl = limiter(2);
        assert!(rl.check("a"));
        assert!(rl.check("a"));
        assert!(!rl.check("a"));
        assert!(rl.check("b"));
    }

    #[test]
    fn window_reset_restores_allowance() {
        let rl = limiter(1);
        let start = Instant::now();
        assert!(rl.check_at("a", start));
        assert!(!rl.check_at("a", start + Duration::from_secs(30)));
        assert!(rl.check_at("a", start + Duration::from_secs(61)));
    }

    #[test]
    fn tracked_clients_never_exceed_cap() {
        let rl = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 60,
            max_clients: 3,
        });
        let start = Instant::now();
        for i in 0..5 {
            assert!(rl.check_at(&format!("client-{i}"), start));
            assert!(rl.tracked_clients() <= 3);
        }
        // client-0 was evicted, so it starts a fresh window.
        assert!(rl.check_at("client-0", start));
        // client-4 is still tracked and exhausted.
        assert!(!rl.check_at("client-4", start));
        assert_eq!(rl.tracked_clients(), 3);
    }

    #[test]
    fn expired_buckets_are_swept() {
        let rl = limiter(5);
        let start = Instant::now();
        for i in 0..100 {
            rl.check_at(&format!("client-{i}"), start);
        }
        assert_eq!(rl.tracked_clients(), 100);
        assert!(rl.check_at("late", start + Duration::from_secs(120)));
        assert_eq!(rl.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn middleware_returns_429_when_exhausted() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(from_fn(rate_limit_middleware))
            .layer(axum::Extension(limiter(1)));

        let request = || {
            axum::http::Request::builder()
                .uri("/test")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
