//! # Disabled Authentication Endpoints
//!
//! Customer sign-in is handled by the hosted BaaS provider. The service's
//! former `/api/auth` endpoints are kept mounted so that old clients get a
//! definite 404 for every method instead of falling through to another
//! handler.

use axum::routing::any;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// Build the disabled auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth", any(disabled))
        .route("/api/auth/*rest", any(disabled))
}

async fn disabled() -> AppError {
    AppError::NotFound("authentication endpoints are disabled".into())
}
