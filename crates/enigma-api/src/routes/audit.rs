//! # Audit Trail API
//!
//! - **GET `/api/legal/audit`** — Audit events, optionally for one entity (staff).
//! - **GET `/api/legal/audit/verify`** — Walk the hash chain (staff).

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, FieldError};
use crate::extractors::extract_query;
use crate::services::audit;
use crate::state::{AppState, AuditRecord};

/// Events returned when `limit` is omitted.
pub const DEFAULT_LIMIT: usize = 100;
/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Query for the audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub limit: Option<usize>,
}

/// A slice of the audit trail, oldest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditTrail {
    pub events: Vec<AuditRecord>,
    pub count: usize,
}

/// Result of verifying the hash chain.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainVerificationResponse {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/legal/audit", get(list_events))
        .route("/api/legal/audit/verify", get(verify_chain))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/legal/audit — Most recent audit events.
#[utoipa::path(
    get,
    path = "/api/legal/audit",
    params(
        ("entity_type" = Option<String>, Query, description = "e.g. cookie_consent, customer, gdpr_request"),
        ("entity_id" = Option<String>, Query, description = "Entity ID"),
        ("limit" = Option<usize>, Query, description = "Most recent events to return (default 100, max 1000)"),
    ),
    responses(
        (status = 200, description = "Audit events, oldest first", body = AuditTrail),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn list_events(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<AuditTrail>, AppError> {
    require_role(&caller, Role::Staff)?;
    let query = extract_query(query)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::InvalidFields(vec![FieldError::new(
            "limit",
            format!("must be between 1 and {MAX_LIMIT}"),
        )]));
    }
    let events = audit::events(
        &state,
        query.entity_type.as_deref(),
        query.entity_id.as_deref(),
        limit,
    );
    Ok(Json(AuditTrail {
        count: events.len(),
        events,
    }))
}

/// GET /api/legal/audit/verify — Verify the audit hash chain.
#[utoipa::path(
    get,
    path = "/api/legal/audit/verify",
    responses(
        (status = 200, description = "Verification result", body = ChainVerificationResponse),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn verify_chain(
    caller: CallerIdentity,
    State(state): State<AppState>,
) -> Result<Json<ChainVerificationResponse>, AppError> {
    require_role(&caller, Role::Staff)?;
    let result = audit::verify(&state);
    if !result.chain_valid {
        tracing::warn!(
            total_events = result.total_events,
            broken_links = result.broken_links,
            "audit chain verification failed"
        );
    }
    Ok(Json(ChainVerificationResponse {
        total_events: result.total_events,
        broken_links: result.broken_links,
        chain_valid: result.chain_valid,
    }))
}
