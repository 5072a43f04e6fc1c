//! # Newsletter & Customer Identification API
//!
//! - **POST `/api/newsletter/identify`** — Find or create the customer for an
//!   email and link the visitor's consent trail to it. Idempotent.
//! - **POST `/api/newsletter/subscribe`** — Subscribe an email.
//! - **GET `/api/newsletter/subscribe`** — Subscription state of an email.
//! - **DELETE `/api/newsletter/subscribe`** — Unsubscribe an email.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use enigma_core::{EmailAddress, VisitorId};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, FieldError};
use crate::extractors::{extract_query, extract_validated_json, FieldErrors, Validate};
use crate::services::identification::{self, Identification};
use crate::services::newsletter::{self, SubscribeOutcome, SubscriptionStatus};
use crate::state::{AppState, NewsletterSubscriptionRecord};

/// Longest accepted signup source label.
pub const MAX_SOURCE_LEN: usize = 50;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to identify a customer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IdentifyRequest {
    pub email: String,
    /// Visitor whose consent trail should be linked to the customer.
    pub visitor_id: Option<String>,
}

impl Validate for IdentifyRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("email", EmailAddress::new(self.email.as_str()));
        if let Some(visitor) = &self.visitor_id {
            errors.check("visitor_id", VisitorId::new(visitor.as_str()));
        }
        errors.finish()
    }
}

/// Request to subscribe to the newsletter.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: String,
    /// Where the signup happened (default "website").
    pub source: Option<String>,
    pub visitor_id: Option<String>,
}

impl Validate for SubscribeRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("email", EmailAddress::new(self.email.as_str()));
        if let Some(visitor) = &self.visitor_id {
            errors.check("visitor_id", VisitorId::new(visitor.as_str()));
        }
        if let Some(source) = &self.source {
            let source = source.trim();
            if source.is_empty() || source.chars().count() > MAX_SOURCE_LEN {
                errors.add("source", format!("must be 1-{MAX_SOURCE_LEN} characters"));
            }
        }
        errors.finish()
    }
}

/// Query naming one email address.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

fn parse_email(raw: &str) -> Result<EmailAddress, AppError> {
    EmailAddress::new(raw).map_err(|e| AppError::InvalidFields(vec![FieldError::new("email", e.to_string())]))
}

fn parse_visitor(raw: Option<&str>) -> Result<Option<VisitorId>, AppError> {
    raw.map(|v| VisitorId::new(v)).transpose().map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the newsletter router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/newsletter/identify", post(identify))
        .route(
            "/api/newsletter/subscribe",
            post(subscribe).get(subscription_status).delete(unsubscribe),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/newsletter/identify — Identify a customer by email.
#[utoipa::path(
    post,
    path = "/api/newsletter/identify",
    request_body = IdentifyRequest,
    responses(
        (status = 200, description = "Customer identified", body = Identification),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "newsletter"
)]
pub(crate) async fn identify(
    State(state): State<AppState>,
    body: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<Identification>, AppError> {
    let req = extract_validated_json(body)?;
    let email = parse_email(&req.email)?;
    let visitor = parse_visitor(req.visitor_id.as_deref())?;
    Ok(Json(identification::identify(&state, email, visitor).await?))
}

/// POST /api/newsletter/subscribe — Subscribe an email.
///
/// Returns 201 for a new subscription and 200 when the email was already
/// subscribed.
#[utoipa::path(
    post,
    path = "/api/newsletter/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscribed", body = SubscribeOutcome),
        (status = 200, description = "Already subscribed", body = SubscribeOutcome),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "newsletter"
)]
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubscribeOutcome>), AppError> {
    let req = extract_validated_json(body)?;
    let email = parse_email(&req.email)?;
    let visitor = parse_visitor(req.visitor_id.as_deref())?;
    let source = req.source.map(|s| s.trim().to_string());
    let outcome = newsletter::subscribe(&state, email, source, visitor).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /api/newsletter/subscribe — Subscription state of an email.
#[utoipa::path(
    get,
    path = "/api/newsletter/subscribe",
    params(("email" = String, Query, description = "Email address")),
    responses(
        (status = 200, description = "Subscription state", body = SubscriptionStatus),
        (status = 422, description = "Invalid email", body = crate::error::ErrorBody),
    ),
    tag = "newsletter"
)]
pub(crate) async fn subscription_status(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<SubscriptionStatus>, AppError> {
    let email = parse_email(&extract_query(query)?.email)?;
    Ok(Json(newsletter::status(&state, email)))
}

/// DELETE /api/newsletter/subscribe — Unsubscribe an email.
#[utoipa::path(
    delete,
    path = "/api/newsletter/subscribe",
    params(("email" = String, Query, description = "Email address")),
    responses(
        (status = 200, description = "Unsubscribed", body = NewsletterSubscriptionRecord),
        (status = 404, description = "No active subscription", body = crate::error::ErrorBody),
    ),
    tag = "newsletter"
)]
pub(crate) async fn unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<NewsletterSubscriptionRecord>, AppError> {
    let email = parse_email(&extract_query(query)?.email)?;
    Ok(Json(newsletter::unsubscribe(&state, &email).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CallerIdentity;
    use crate::routes::test_support::{mount, send};
    use serde_json::json;

    fn test_app(state: AppState) -> Router {
        mount(router(), state, CallerIdentity::anonymous())
    }

    #[tokio::test]
    async fn identify_is_idempotent() {
        let state = AppState::new();
        let app = test_app(state.clone());
        let body = json!({"email": "Ana@Example.com", "visitor_id": "v-42"});

        let (status, first) = send(&app, "POST", "/api/newsletter/identify", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["method"], "new_customer");
        assert_eq!(first["customer"]["email"], "ana@example.com");
        assert_eq!(first["identity"]["visitor_id"], "v-42");

        let (status, second) = send(&app, "POST", "/api/newsletter/identify", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["method"], "email_match");
        assert_eq!(second["customer"]["id"], first["customer"]["id"]);
        assert_eq!(state.customers.len(), 1);
        assert_eq!(state.identity_links.len(), 1);
    }

    #[tokio::test]
    async fn identify_rejects_bad_email() {
        let app = test_app(AppState::new());
        let (status, body) =
            send(&app, "POST", "/api/newsletter/identify", Some(json!({"email": "not-an-email"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"]["fields"][0]["field"], "email");
    }

    #[tokio::test]
    async fn subscribe_status_unsubscribe() {
        let app = test_app(AppState::new());
        let body = json!({"email": "luis@example.com", "source": "footer"});

        let (status, created) = send(&app, "POST", "/api/newsletter/subscribe", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["created"], true);
        assert_eq!(created["subscription"]["source"], "footer");

        let (status, again) = send(&app, "POST", "/api/newsletter/subscribe", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["created"], false);
        assert_eq!(again["subscription"]["id"], created["subscription"]["id"]);

        let (_, state_body) = send(&app, "GET", "/api/newsletter/subscribe?email=luis@example.com", None).await;
        assert_eq!(state_body["subscribed"], true);

        let (status, removed) =
            send(&app, "DELETE", "/api/newsletter/subscribe?email=luis@example.com", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(removed["unsubscribed_at"].is_string());

        let (_, state_body) = send(&app, "GET", "/api/newsletter/subscribe?email=luis@example.com", None).await;
        assert_eq!(state_body["subscribed"], false);

        let (status, _) =
            send(&app, "DELETE", "/api/newsletter/subscribe?email=luis@example.com", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subscribe_validates_source() {
        let app = test_app(AppState::new());
        let (status, _) = send(
            &app,
            "POST",
            "/api/newsletter/subscribe",
            Some(json!({"email": "a@example.com", "source": "x".repeat(MAX_SOURCE_LEN + 1)})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
