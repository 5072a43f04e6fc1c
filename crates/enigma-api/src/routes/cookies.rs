//! # Cookie Consent API
//!
//! - **POST `/api/legal/cookies`** — Record a consent decision (always a new entry).
//! - **GET `/api/legal/cookies`** — Banner decision for a visitor.
//! - **POST `/api/legal/cookies/withdraw`** — Record a withdrawal.
//! - **GET `/api/legal/cookies/history`** — A visitor's full trail (staff).
//! - **GET `/api/legal/cookies/stats`** — Aggregates over recent days (staff).

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use enigma_core::{ConsentMethod, ConsentPreferences, VisitorId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, FieldError};
use crate::extractors::{extract_query, extract_validated_json, ClientContext, FieldErrors, Validate};
use crate::services::cookie_consent::{self, ConsentStatisticsReport, ConsentStatus};
use crate::state::{AppState, CookieConsentRecord};

/// Reporting period used when `days` is omitted.
pub const DEFAULT_STATS_DAYS: u32 = 30;
/// Longest reporting period.
pub const MAX_STATS_DAYS: u32 = 365;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to record a consent decision.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordConsentRequest {
    /// Browser-scoped id issued by the banner.
    pub visitor_id: String,
    /// Per-category choices. `necessary` is always stored as true.
    #[schema(value_type = Object)]
    pub preferences: ConsentPreferences,
    /// "banner" (default), "api" or "implicit".
    pub method: Option<String>,
}

impl Validate for RecordConsentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("visitor_id", VisitorId::new(self.visitor_id.as_str()));
        if let Some(method) = &self.method {
            errors.check("method", method.parse::<ConsentMethod>());
        }
        errors.finish()
    }
}

/// Request to withdraw consent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawConsentRequest {
    pub visitor_id: String,
    /// "banner" (default), "api" or "implicit".
    pub method: Option<String>,
}

impl Validate for WithdrawConsentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("visitor_id", VisitorId::new(self.visitor_id.as_str()));
        if let Some(method) = &self.method {
            errors.check("method", method.parse::<ConsentMethod>());
        }
        errors.finish()
    }
}

/// Query naming one visitor.
#[derive(Debug, Deserialize)]
pub struct VisitorQuery {
    pub visitor_id: String,
}

/// Query for consent statistics.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

/// A visitor's consent trail, oldest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentHistory {
    #[schema(value_type = String)]
    pub visitor_id: VisitorId,
    pub entries: Vec<CookieConsentRecord>,
}

fn parse_visitor(raw: &str) -> Result<VisitorId, AppError> {
    VisitorId::new(raw).map_err(|e| AppError::InvalidFields(vec![FieldError::new("visitor_id", e.to_string())]))
}

fn parse_method(raw: Option<&str>) -> Result<ConsentMethod, AppError> {
    Ok(match raw {
        Some(m) => m.parse()?,
        None => ConsentMethod::Banner,
    })
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the cookie consent router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/legal/cookies", get(get_status).post(record_consent))
        .route("/api/legal/cookies/withdraw", post(withdraw_consent))
        .route("/api/legal/cookies/history", get(get_consent_history))
        .route("/api/legal/cookies/stats", get(get_stats))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/legal/cookies — Append a consent decision.
#[utoipa::path(
    post,
    path = "/api/legal/cookies",
    request_body = RecordConsentRequest,
    responses(
        (status = 201, description = "Consent recorded", body = CookieConsentRecord),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "cookies"
)]
pub(crate) async fn record_consent(
    ctx: ClientContext,
    State(state): State<AppState>,
    body: Result<Json<RecordConsentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CookieConsentRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let visitor = parse_visitor(&req.visitor_id)?;
    let method = parse_method(req.method.as_deref())?;
    let record = cookie_consent::record(&state, visitor, req.preferences, method, &ctx).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/legal/cookies — Whether the banner must be shown to a visitor.
#[utoipa::path(
    get,
    path = "/api/legal/cookies",
    params(("visitor_id" = String, Query, description = "Visitor ID issued by the banner")),
    responses(
        (status = 200, description = "Banner decision", body = ConsentStatus),
        (status = 422, description = "Invalid visitor ID", body = crate::error::ErrorBody),
    ),
    tag = "cookies"
)]
pub(crate) async fn get_status(
    State(state): State<AppState>,
    query: Result<Query<VisitorQuery>, QueryRejection>,
) -> Result<Json<ConsentStatus>, AppError> {
    let query = extract_query(query)?;
    let visitor = parse_visitor(&query.visitor_id)?;
    Ok(Json(cookie_consent::status(&state, visitor, Utc::now())))
}

/// POST /api/legal/cookies/withdraw — Append a withdrawal.
#[utoipa::path(
    post,
    path = "/api/legal/cookies/withdraw",
    request_body = WithdrawConsentRequest,
    responses(
        (status = 201, description = "Withdrawal recorded", body = CookieConsentRecord),
        (status = 404, description = "Visitor has no consent on record", body = crate::error::ErrorBody),
    ),
    tag = "cookies"
)]
pub(crate) async fn withdraw_consent(
    ctx: ClientContext,
    State(state): State<AppState>,
    body: Result<Json<WithdrawConsentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CookieConsentRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let visitor = parse_visitor(&req.visitor_id)?;
    let method = parse_method(req.method.as_deref())?;
    let record = cookie_consent::withdraw(&state, visitor, method, &ctx).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/legal/cookies/history — Full consent trail of a visitor.
#[utoipa::path(
    get,
    path = "/api/legal/cookies/history",
    params(("visitor_id" = String, Query, description = "Visitor ID")),
    responses(
        (status = 200, description = "Consent trail, oldest first", body = ConsentHistory),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
    ),
    tag = "cookies"
)]
pub(crate) async fn get_consent_history(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<VisitorQuery>, QueryRejection>,
) -> Result<Json<ConsentHistory>, AppError> {
    require_role(&caller, Role::Staff)?;
    let query = extract_query(query)?;
    let visitor = parse_visitor(&query.visitor_id)?;
    let entries = cookie_consent::history(&state, &visitor);
    Ok(Json(ConsentHistory {
        visitor_id: visitor,
        entries,
    }))
}

/// GET /api/legal/cookies/stats — Consent statistics.
#[utoipa::path(
    get,
    path = "/api/legal/cookies/stats",
    params(("days" = Option<u32>, Query, description = "Reporting period in days (default 30, max 365)")),
    responses(
        (status = 200, description = "Statistics", body = ConsentStatisticsReport),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
        (status = 422, description = "Period out of range", body = crate::error::ErrorBody),
    ),
    tag = "cookies"
)]
pub(crate) async fn get_stats(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<ConsentStatisticsReport>, AppError> {
    require_role(&caller, Role::Staff)?;
    let days = extract_query(query)?.days.unwrap_or(DEFAULT_STATS_DAYS);
    if !(1..=MAX_STATS_DAYS).contains(&days) {
        return Err(AppError::InvalidFields(vec![FieldError::new(
            "days",
            format!("must be between 1 and {MAX_STATS_DAYS}"),
        )]));
    }
    Ok(Json(cookie_consent::statistics(&state, days, Utc::now())))
}
