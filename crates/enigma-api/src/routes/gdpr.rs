//! # GDPR Rights Requests API
//!
//! - **POST `/api/legal/gdpr`** — Submit a data subject rights request.
//! - **GET `/api/legal/gdpr`** — List requests with filters (staff).
//! - **GET `/api/legal/gdpr/:id`** — One request (staff).
//! - **PUT `/api/legal/gdpr/:id`** — Move a request through its lifecycle (staff).
//!
//! Requests must be answered within 30 days; the due date is fixed at
//! submission. Invalid status transitions are rejected with 409.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use enigma_core::{EmailAddress, GdprRequestStatus, GdprRequestType, Locale};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, FieldError};
use crate::extractors::{extract_query, extract_validated_json, ClientContext, FieldErrors, Validate};
use crate::services::gdpr::{self, GdprFilter, GdprRequestPage, GdprSubmission, MAX_DESCRIPTION_LEN};
use crate::state::{AppState, GdprRequestRecord};

/// Page size used when `limit` is omitted.
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Largest page size.
pub const MAX_PAGE_SIZE: usize = 100;
/// Longest accepted staff response.
pub const MAX_RESPONSE_NOTES_LEN: usize = 5000;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to exercise a data subject right.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitGdprRequest {
    /// access, rectification, erasure, portability, restriction or objection.
    pub request_type: String,
    pub email: String,
    pub description: Option<String>,
    /// Language the response should be written in (default "es").
    pub language: Option<String>,
}

impl Validate for SubmitGdprRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("request_type", self.request_type.parse::<GdprRequestType>());
        errors.check("email", EmailAddress::new(self.email.as_str()));
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                errors.add("description", format!("must not exceed {MAX_DESCRIPTION_LEN} characters"));
            }
        }
        if let Some(language) = &self.language {
            errors.check("language", language.parse::<Locale>());
        }
        errors.finish()
    }
}

impl SubmitGdprRequest {
    fn into_submission(self) -> Result<GdprSubmission, AppError> {
        Ok(GdprSubmission {
            request_type: self.request_type.parse()?,
            email: EmailAddress::new(self.email)?,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            language: match self.language {
                Some(code) => code.parse()?,
                None => Locale::DEFAULT,
            },
        })
    }
}

/// Request to change the status of a rights request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateGdprStatusRequest {
    /// in_progress, completed, rejected or expired.
    pub status: String,
    /// Answer sent to the data subject.
    pub response_notes: Option<String>,
}

impl Validate for UpdateGdprStatusRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("status", self.status.parse::<GdprRequestStatus>());
        if let Some(notes) = &self.response_notes {
            if notes.chars().count() > MAX_RESPONSE_NOTES_LEN {
                errors.add("response_notes", format!("must not exceed {MAX_RESPONSE_NOTES_LEN} characters"));
            }
        }
        errors.finish()
    }
}

/// Filters and pagination for the request listing.
#[derive(Debug, Deserialize)]
pub struct ListGdprQuery {
    pub status: Option<String>,
    pub request_type: Option<String>,
    pub email: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ListGdprQuery {
    fn into_filter(self) -> Result<(GdprFilter, usize, usize), AppError> {
        let mut errors = FieldErrors::new();
        let status = self
            .status
            .as_deref()
            .and_then(|s| errors.check("status", s.parse::<GdprRequestStatus>()));
        let request_type = self
            .request_type
            .as_deref()
            .and_then(|t| errors.check("request_type", t.parse::<GdprRequestType>()));
        let email = self
            .email
            .as_deref()
            .and_then(|e| errors.check("email", EmailAddress::new(e)));
        let page = self.page.unwrap_or(1);
        if page == 0 {
            errors.add("page", "must be at least 1");
        }
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            errors.add("limit", format!("must be between 1 and {MAX_PAGE_SIZE}"));
        }
        errors.finish().map_err(AppError::InvalidFields)?;
        Ok((
            GdprFilter {
                status,
                request_type,
                email,
            },
            page,
            limit,
        ))
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the GDPR router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/legal/gdpr", get(list_requests).post(submit_request))
        .route("/api/legal/gdpr/:id", get(get_request).put(update_request))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/legal/gdpr — Submit a rights request.
#[utoipa::path(
    post,
    path = "/api/legal/gdpr",
    request_body = SubmitGdprRequest,
    responses(
        (status = 201, description = "Request registered", body = GdprRequestRecord),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "gdpr"
)]
pub(crate) async fn submit_request(
    ctx: ClientContext,
    State(state): State<AppState>,
    body: Result<Json<SubmitGdprRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GdprRequestRecord>), AppError> {
    let submission = extract_validated_json(body)?.into_submission()?;
    let record = gdpr::submit(&state, submission, &ctx).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/legal/gdpr — List rights requests, newest first.
#[utoipa::path(
    get,
    path = "/api/legal/gdpr",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("request_type" = Option<String>, Query, description = "Filter by request type"),
        ("email" = Option<String>, Query, description = "Filter by email"),
        ("page" = Option<usize>, Query, description = "Page number, from 1"),
        ("limit" = Option<usize>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Page of requests", body = GdprRequestPage),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
    ),
    tag = "gdpr"
)]
pub(crate) async fn list_requests(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<ListGdprQuery>, QueryRejection>,
) -> Result<Json<GdprRequestPage>, AppError> {
    require_role(&caller, Role::Staff)?;
    let (filter, page, limit) = extract_query(query)?.into_filter()?;
    Ok(Json(gdpr::list(&state, &filter, page, limit)))
}

/// GET /api/legal/gdpr/:id — One rights request.
#[utoipa::path(
    get,
    path = "/api/legal/gdpr/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = GdprRequestRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "gdpr"
)]
pub(crate) async fn get_request(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GdprRequestRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    Ok(Json(gdpr::get(&state, id)?))
}

/// PUT /api/legal/gdpr/:id — Change the status of a rights request.
#[utoipa::path(
    put,
    path = "/api/legal/gdpr/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = UpdateGdprStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = GdprRequestRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorBody),
    ),
    tag = "gdpr"
)]
pub(crate) async fn update_request(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateGdprStatusRequest>, JsonRejection>,
) -> Result<Json<GdprRequestRecord>, AppError> {
    require_role(&caller, Role::Staff)?;
    let req = extract_validated_json(body)?;
    let to: GdprRequestStatus = req.status.parse()?;
    let notes = req
        .response_notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    Ok(Json(gdpr::update_status(&state, id, to, notes, &caller).await?))
}
