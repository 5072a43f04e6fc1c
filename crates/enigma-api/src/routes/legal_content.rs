//! # Legal Content API
//!
//! - **GET `/api/legal/content`** — Current document for `type` and `locale`,
//!   or a specific `version`. Without `type`, every current document in the
//!   locale.
//! - **GET `/api/legal/content/history`** — Every version, newest first.
//! - **GET `/api/legal/content/:id`** — One version by id.
//! - **POST `/api/legal/content`** — Publish the next version (staff).
//!
//! Versions with a future effective date are visible to staff only until
//! they take effect.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use enigma_core::{LegalDocumentType, Locale};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{requested_locale, requested_type};
use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, FieldError};
use crate::extractors::{extract_query, extract_validated_json, FieldErrors, Validate};
use crate::services::legal_content::{self, DocumentDraft, LegalDocumentView};
use crate::state::{AppState, LegalDocumentRecord};

/// Longest accepted document title.
pub const MAX_TITLE_LEN: usize = 200;
/// Longest accepted document body, in bytes.
pub const MAX_BODY_LEN: usize = 512 * 1024;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Query for `GET /api/legal/content`.
#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub locale: Option<String>,
    pub version: Option<u32>,
}

/// Query for `GET /api/legal/content/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "type")]
    pub document_type: String,
    pub locale: Option<String>,
}

/// Every current document in one locale.
#[derive(Debug, Serialize, ToSchema)]
pub struct LegalDocumentList {
    pub locale: String,
    pub documents: Vec<LegalDocumentView>,
}

/// Version history of one (type, locale) pair.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LegalDocumentHistory {
    pub document_type: String,
    pub locale: String,
    /// Newest first.
    pub versions: Vec<LegalDocumentRecord>,
}

/// Request to publish a new document version.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishDocumentRequest {
    /// Document type, e.g. "privacy_policy" (short forms like "privacy" accepted).
    #[serde(rename = "type")]
    pub document_type: String,
    /// "es" or "en".
    pub locale: String,
    pub title: String,
    /// Body text with `#` heading markers.
    pub body: String,
    /// When the version takes effect. Omitted or past means immediately.
    pub effective_at: Option<DateTime<Utc>>,
    /// Staff member publishing the version.
    pub created_by: Option<String>,
}

impl Validate for PublishDocumentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.check("type", self.document_type.parse::<LegalDocumentType>());
        errors.check("locale", self.locale.parse::<Locale>());
        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", "must not be empty");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.add("title", format!("must not exceed {MAX_TITLE_LEN} characters"));
        }
        if self.body.trim().is_empty() {
            errors.add("body", "must not be empty");
        } else if self.body.len() > MAX_BODY_LEN {
            errors.add("body", format!("must not exceed {MAX_BODY_LEN} bytes"));
        }
        if let Some(author) = &self.created_by {
            if author.trim().is_empty() || author.len() > MAX_TITLE_LEN {
                errors.add("created_by", format!("must be 1-{MAX_TITLE_LEN} characters"));
            }
        }
        errors.finish()
    }
}

impl PublishDocumentRequest {
    fn into_draft(self) -> Result<DocumentDraft, AppError> {
        Ok(DocumentDraft {
            document_type: self.document_type.parse()?,
            locale: self.locale.parse()?,
            title: self.title,
            body: self.body,
            effective_at: self.effective_at,
            created_by: self.created_by.map(|s| s.trim().to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the legal content router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/legal/content", get(get_content).post(publish_content))
        .route("/api/legal/content/history", get(get_history))
        .route("/api/legal/content/:id", get(get_by_id))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Hide versions that have not taken effect from everyone but staff.
fn visible(
    doc: LegalDocumentRecord,
    caller: &CallerIdentity,
    now: DateTime<Utc>,
) -> Result<LegalDocumentRecord, AppError> {
    if doc.is_published_at(now) || caller.has_role(Role::Staff) {
        Ok(doc)
    } else {
        Err(AppError::NotFound(format!(
            "version {} of {} ({}) is not published yet",
            doc.version,
            doc.document_type.as_str(),
            doc.locale.as_str()
        )))
    }
}

/// GET /api/legal/content — Current or specific document version.
#[utoipa::path(
    get,
    path = "/api/legal/content",
    params(
        ("type" = Option<String>, Query, description = "Document type; omit to list every current document"),
        ("locale" = Option<String>, Query, description = "es (default) or en"),
        ("version" = Option<u32>, Query, description = "Exact version instead of the current one"),
    ),
    responses(
        (status = 200, description = "Document view, or the locale listing when no type is given", body = LegalDocumentView),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown type, locale or version", body = crate::error::ErrorBody),
    ),
    tag = "legal_content"
)]
pub(crate) async fn get_content(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<ContentQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = extract_query(query)?;
    let locale = requested_locale(query.locale.as_deref())?;
    let now = Utc::now();

    let Some(raw_type) = query.document_type.as_deref() else {
        let documents = legal_content::list_current(&state, locale, now)
            .into_iter()
            .map(LegalDocumentView::new)
            .collect();
        let list = LegalDocumentList {
            locale: locale.as_str().to_string(),
            documents,
        };
        return Ok(Json(list).into_response());
    };

    let document_type = requested_type(raw_type)?;
    let document = match query.version {
        Some(n) => visible(
            legal_content::version(&state, document_type, locale, n)?,
            &caller,
            now,
        )?,
        None => legal_content::current(&state, document_type, locale, now)?,
    };
    Ok(Json(LegalDocumentView::new(document)).into_response())
}

/// GET /api/legal/content/history — Version history, newest first.
#[utoipa::path(
    get,
    path = "/api/legal/content/history",
    params(
        ("type" = String, Query, description = "Document type"),
        ("locale" = Option<String>, Query, description = "es (default) or en"),
    ),
    responses(
        (status = 200, description = "Version history", body = LegalDocumentHistory),
        (status = 404, description = "No versions", body = crate::error::ErrorBody),
    ),
    tag = "legal_content"
)]
pub(crate) async fn get_history(
    caller: CallerIdentity,
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<LegalDocumentHistory>, AppError> {
    let query = extract_query(query)?;
    let locale = requested_locale(query.locale.as_deref())?;
    let document_type = requested_type(&query.document_type)?;
    let now = Utc::now();

    let versions: Vec<LegalDocumentRecord> = legal_content::history(&state, document_type, locale)?
        .into_iter()
        .filter(|d| d.is_published_at(now) || caller.has_role(Role::Staff))
        .collect();
    if versions.is_empty() {
        return Err(AppError::NotFound(format!(
            "no published {} document for locale '{}'",
            document_type.as_str(),
            locale.as_str()
        )));
    }

    Ok(Json(LegalDocumentHistory {
        document_type: document_type.as_str().to_string(),
        locale: locale.as_str().to_string(),
        versions,
    }))
}

/// GET /api/legal/content/:id — One version by id.
#[utoipa::path(
    get,
    path = "/api/legal/content/{id}",
    params(("id" = Uuid, Path, description = "Document version ID")),
    responses(
        (status = 200, description = "Document view", body = LegalDocumentView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "legal_content"
)]
pub(crate) async fn get_by_id(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LegalDocumentView>, AppError> {
    let document = visible(legal_content::by_id(&state, id)?, &caller, Utc::now())?;
    Ok(Json(LegalDocumentView::new(document)))
}

/// POST /api/legal/content — Publish the next version of a document.
#[utoipa::path(
    post,
    path = "/api/legal/content",
    request_body = PublishDocumentRequest,
    responses(
        (status = 201, description = "Version published", body = LegalDocumentView),
        (status = 401, description = "Staff credentials required", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "legal_content"
)]
pub(crate) async fn publish_content(
    caller: CallerIdentity,
    State(state): State<AppState>,
    body: Result<Json<PublishDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LegalDocumentView>), AppError> {
    require_role(&caller, Role::Staff)?;
    let draft = extract_validated_json(body)?.into_draft()?;
    let record = legal_content::publish(&state, draft, &caller).await?;
    Ok((StatusCode::CREATED, Json(LegalDocumentView::new(record))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{mount, send};
    use chrono::Duration;
    use serde_json::json;

    fn publish_body(doc_type: &str, locale: &str, title: &str) -> serde_json::Value {
        json!({
            "type": doc_type,
            "locale": locale,
            "title": title,
            "body": "Intro paragraph.\n\n# Data we collect\n\n## Reservations\n\nName and phone.\n\n# Your rights",
            "created_by": "maria"
        })
    }

    #[tokio::test]
    async fn publish_then_fetch_current() {
        let state = AppState::new();
        let staff = mount(router(), state.clone(), CallerIdentity::staff());

        let (status, created) =
            send(&staff, "POST", "/api/legal/content", Some(publish_body("privacy", "es", "Política de privacidad"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["document"]["version"], 1);
        assert_eq!(created["document"]["document_type"], "privacy_policy");
        assert_eq!(created["version_label"], "v1.0");
        assert_eq!(created["page_path"], "/legal/politica-privacidad");
        assert_eq!(created["summary"], "Intro paragraph.");
        let toc = created["table_of_contents"].as_array().unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0]["children"].as_array().unwrap().len(), 1);

        let visitor = mount(router(), state, CallerIdentity::anonymous());
        let (status, fetched) =
            send(&visitor, "GET", "/api/legal/content?type=privacy_policy&locale=es", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["document"]["id"], created["document"]["id"]);
    }

    #[tokio::test]
    async fn unknown_type_or_locale_is_not_found() {
        let state = AppState::new();
        let staff = mount(router(), state.clone(), CallerIdentity::staff());
        send(&staff, "POST", "/api/legal/content", Some(publish_body("terms", "es", "Términos"))).await;

        let (status, body) = send(&staff, "GET", "/api/legal/content?type=menu&locale=es", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = send(&staff, "GET", "/api/legal/content?type=terms&locale=fr", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Published in Spanish only: English must not fall back.
        let (status, _) = send(&staff, "GET", "/api/legal/content?type=terms&locale=en", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn versions_and_history() {
        let state = AppState::new();
        let staff = mount(router(), state.clone(), CallerIdentity::staff());
        for title in ["Aviso legal", "Aviso legal (rev)"] {
            let (status, _) =
                send(&staff, "POST", "/api/legal/content", Some(publish_body("legal_notice", "es", title))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, current) = send(&staff, "GET", "/api/legal/content?type=notice", None).await;
        assert_eq!(current["document"]["version"], 2);
        assert_eq!(current["document"]["title"], "Aviso legal (rev)");

        let (_, first) = send(&staff, "GET", "/api/legal/content?type=notice&version=1", None).await;
        assert_eq!(first["document"]["title"], "Aviso legal");

        let (status, _) = send(&staff, "GET", "/api/legal/content?type=notice&version=7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, history) =
            send(&staff, "GET", "/api/legal/content/history?type=legal_notice&locale=es", None).await;
        assert_eq!(status, StatusCode::OK);
        let versions = history["versions"].as_array().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0]["version"], 2);

        let id = first["document"]["id"].as_str().unwrap();
        let (status, by_id) = send(&staff, "GET", &format!("/api/legal/content/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_id["document"]["version"], 1);
    }

    #[tokio::test]
    async fn listing_without_type() {
        let state = AppState::new();
        let staff = mount(router(), state.clone(), CallerIdentity::staff());
        send(&staff, "POST", "/api/legal/content", Some(publish_body("privacy", "en", "Privacy Policy"))).await;
        send(&staff, "POST", "/api/legal/content", Some(publish_body("cookies", "en", "Cookie Policy"))).await;
        send(&staff, "POST", "/api/legal/content", Some(publish_body("cookies", "es", "Política de cookies"))).await;

        let (status, list) = send(&staff, "GET", "/api/legal/content?locale=en", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["locale"], "en");
        assert_eq!(list["documents"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scheduled_version_hidden_from_visitors() {
        let state = AppState::new();
        let staff = mount(router(), state.clone(), CallerIdentity::staff());
        let mut body = publish_body("privacy", "es", "Futura");
        body["effective_at"] = json!(Utc::now() + Duration::days(10));
        let (_, created) = send(&staff, "POST", "/api/legal/content", Some(body)).await;
        let id = created["document"]["id"].as_str().unwrap().to_string();

        let visitor = mount(router(), state, CallerIdentity::anonymous());
        let (status, _) = send(&visitor, "GET", "/api/legal/content?type=privacy", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&visitor, "GET", "/api/legal/content?type=privacy&version=1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&visitor, "GET", &format!("/api/legal/content/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&visitor, "GET", "/api/legal/content/history?type=privacy", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&staff, "GET", "/api/legal/content?type=privacy&version=1", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn publish_requires_staff() {
        let visitor = mount(router(), AppState::new(), CallerIdentity::anonymous());
        let (status, _) =
            send(&visitor, "POST", "/api/legal/content", Some(publish_body("privacy", "es", "X"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn publish_rejects_invalid_fields() {
        let staff = mount(router(), AppState::new(), CallerIdentity::staff());
        let (status, body) = send(
            &staff,
            "POST",
            "/api/legal/content",
            Some(json!({"type": "menu", "locale": "fr", "title": " ", "body": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields: Vec<&str> = body["error"]["details"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["type", "locale", "title", "body"]);
    }

    #[tokio::test]
    async fn malformed_query_is_bad_request() {
        let staff = mount(router(), AppState::new(), CallerIdentity::staff());
        let (status, body) =
            send(&staff, "GET", "/api/legal/content?type=privacy&version=latest", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}
