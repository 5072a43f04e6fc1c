//! # Prometheus Metrics
//!
//! Lightweight request metrics using atomic counters, exposed in the
//! Prometheus text format at `/metrics`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;

/// Shared metrics state.
#[derive(Debug, Clone)]
pub struct ApiMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub rate_limited_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            rate_limited_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Return current error count.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Return the number of requests rejected with 429.
    pub fn rate_limited(&self) -> u64 {
        self.rate_limited_count.load(Ordering::Relaxed)
    }

    /// Render the counters in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, help, value) in [
            ("enigma_http_requests_total", "HTTP requests served.", self.requests()),
            ("enigma_http_errors_total", "HTTP responses with a 4xx or 5xx status.", self.errors()),
            ("enigma_http_rate_limited_total", "Requests rejected by the rate limiter.", self.rate_limited()),
        ] {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that increments request and error counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if response.status().is_server_error() || response.status().is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}

/// `GET /metrics` handler.
pub async fn render_metrics(Extension(metrics): Extension<ApiMetrics>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
        assert_eq!(m.rate_limited(), 0);
    }

    #[test]
    fn render_lists_every_counter() {
        let m = ApiMetrics::new();
        m.request_count.fetch_add(3, Ordering::Relaxed);
        m.error_count.fetch_add(1, Ordering::Relaxed);
        let text = m.render();
        assert!(text.contains("enigma_http_requests_total 3"));
        assert!(text.contains("enigma_http_errors_total 1"));
        assert!(text.contains("# TYPE enigma_http_rate_limited_total counter"));
    }

    #[test]
    fn clones_share_counters() {
        let m = ApiMetrics::new();
        let clone = m.clone();
        clone.request_count.fetch_add(1, Ordering::Relaxed);
        assert_eq!(m.requests(), 1);
    }
}
