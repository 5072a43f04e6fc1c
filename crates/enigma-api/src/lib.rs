//! # enigma-api — Legal, Consent & GDPR Service for the Enigma Website
//!
//! Serves the restaurant's legal pages from versioned, database-backed
//! documents, keeps an append-only trail of cookie consent decisions,
//! identifies newsletter customers and links them to a visitor's consent
//! trail, and registers GDPR rights requests. Every mutation is recorded in
//! a SHA-256 hash-chained audit log.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                       | Access        |
//! |---------------------------|------------------------------|---------------|
//! | `/api/legal/content*`     | [`routes::legal_content`]    | public / staff publish |
//! | `/api/legal/cookies*`     | [`routes::cookies`]          | public / staff reports |
//! | `/api/newsletter/*`       | [`routes::newsletter`]       | public        |
//! | `/api/legal/gdpr*`        | [`routes::gdpr`]             | public submit / staff |
//! | `/api/legal/audit*`       | [`routes::audit`]            | staff         |
//! | `/api/config/public`      | [`routes::public_config`]    | public        |
//! | `/api/auth*`              | [`routes::auth_disabled`]    | always 404    |
//! | `/legal/*`, `/en/legal/*` | [`routes::pages`]            | public HTML   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → RateLimitMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes and the disabled `/api/auth*` routes sit outside the stack.
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::extractors::TrustedProxies;
use crate::middleware::rate_limit::RateLimiter;
use crate::state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the middleware stack so
/// they stay cheap and are never rate limited. `/api/auth*` is mounted there
/// too: it answers 404 whatever credentials a caller sends.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(state.config.rate_limit.clone());
    let trusted_proxies = TrustedProxies(state.config.trusted_proxies);

    let api = Router::new()
        .merge(routes::legal_content::router())
        .merge(routes::cookies::router())
        .merge(routes::newsletter::router())
        .merge(routes::gdpr::router())
        .merge(routes::audit::router())
        .merge(routes::public_config::router())
        .merge(routes::pages::router())
        .merge(openapi::router())
        .route("/metrics", get(middleware::metrics::render_metrics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .layer(axum::Extension(limiter))
        .layer(axum::Extension(trusted_proxies))
        .with_state(state.clone());

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    let auth_disabled = routes::auth_disabled::router().with_state(state);

    Router::new().merge(health).merge(auth_disabled).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
