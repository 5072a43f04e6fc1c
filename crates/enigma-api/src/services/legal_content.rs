//! Legal content: versioned documents per (type, locale).
//!
//! A document is never edited. Publishing appends the next version; the
//! current version is the highest one whose `published_at` has passed, so a
//! version published with a future effective date stays scheduled until then.

use chrono::{DateTime, Utc};
use enigma_core::legal::{normalize_body, policy_version_label};
use enigma_core::toc::{summary, table_of_contents};
use enigma_core::{AuditEventType, LegalDocumentType, Locale, TocEntry, DEFAULT_POLICY_VERSION};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::AuditEvent;
use super::{persist_failed, Mutation};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::{AppState, LegalDocumentRecord};

/// Longest summary used for page descriptions.
pub const SUMMARY_MAX_CHARS: usize = 160;

/// A new document version as submitted by staff.
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub document_type: LegalDocumentType,
    pub locale: Locale,
    pub title: String,
    pub body: String,
    pub effective_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

/// A document together with its derived navigation data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LegalDocumentView {
    pub document: LegalDocumentRecord,
    /// Nested table of contents.
    #[schema(value_type = Vec<Object>)]
    pub table_of_contents: Vec<TocEntry>,
    /// First paragraph, shortened for meta descriptions.
    pub summary: String,
    /// Public page route, e.g. `/en/legal/privacy-policy`.
    pub page_path: String,
    /// `v{n}.0` label of this version.
    pub version_label: String,
}

impl LegalDocumentView {
    pub fn new(document: LegalDocumentRecord) -> Self {
        Self {
            table_of_contents: table_of_contents(&document.body),
            summary: summary(&document.body, SUMMARY_MAX_CHARS),
            page_path: document.document_type.page_path(document.locale),
            version_label: policy_version_label(document.version),
            document,
        }
    }
}

fn not_found(document_type: LegalDocumentType, locale: Locale) -> AppError {
    AppError::NotFound(format!(
        "no published {} document for locale '{}'",
        document_type.as_str(),
        locale.as_str()
    ))
}

fn matches(doc: &LegalDocumentRecord, document_type: LegalDocumentType, locale: Locale) -> bool {
    doc.document_type == document_type && doc.locale == locale
}

/// Latest version published at `now`.
pub fn current(
    state: &AppState,
    document_type: LegalDocumentType,
    locale: Locale,
    now: DateTime<Utc>,
) -> Result<LegalDocumentRecord, AppError> {
    state
        .legal_documents
        .with_entries(|docs| {
            docs.iter()
                .filter(|d| matches(d, document_type, locale) && d.is_published_at(now))
                .max_by_key(|d| d.version)
                .cloned()
        })
        .ok_or_else(|| not_found(document_type, locale))
}

/// One exact version, published or scheduled.
pub fn version(
    state: &AppState,
    document_type: LegalDocumentType,
    locale: Locale,
    version: u32,
) -> Result<LegalDocumentRecord, AppError> {
    state
        .legal_documents
        .find(|d| matches(d, document_type, locale) && d.version == version)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "version {version} of {} ({}) not found",
                document_type.as_str(),
                locale.as_str()
            ))
        })
}

/// Every version, newest first.
pub fn history(
    state: &AppState,
    document_type: LegalDocumentType,
    locale: Locale,
) -> Result<Vec<LegalDocumentRecord>, AppError> {
    let mut versions = state.legal_documents.filter(|d| matches(d, document_type, locale));
    if versions.is_empty() {
        return Err(not_found(document_type, locale));
    }
    versions.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(versions)
}

/// The current document of every type that has one in `locale`.
pub fn list_current(state: &AppState, locale: Locale, now: DateTime<Utc>) -> Vec<LegalDocumentRecord> {
    LegalDocumentType::ALL
        .into_iter()
        .filter_map(|t| current(state, t, locale, now).ok())
        .collect()
}

pub fn by_id(state: &AppState, id: Uuid) -> Result<LegalDocumentRecord, AppError> {
    state
        .legal_documents
        .find(|d| d.id == id)
        .ok_or_else(|| AppError::NotFound(format!("legal document {id} not found")))
}

/// Policy version stamped on consents: the label of the current Spanish
/// privacy policy, or `v1.0` while none is published.
pub fn current_policy_version(state: &AppState, now: DateTime<Utc>) -> String {
    current(state, LegalDocumentType::PrivacyPolicy, Locale::DEFAULT, now)
        .map(|d| policy_version_label(d.version))
        .unwrap_or_else(|_| DEFAULT_POLICY_VERSION.to_string())
}

/// Append the next version of a document.
pub async fn publish(
    state: &AppState,
    draft: DocumentDraft,
    caller: &CallerIdentity,
) -> Result<LegalDocumentRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;

    let now = Utc::now();
    let next = state.legal_documents.with_entries(|docs| {
        docs.iter()
            .filter(|d| matches(d, draft.document_type, draft.locale))
            .map(|d| d.version)
            .max()
            .unwrap_or(0)
            + 1
    });
    let record = LegalDocumentRecord {
        id: Uuid::new_v4(),
        document_type: draft.document_type,
        locale: draft.locale,
        title: draft.title.trim().to_string(),
        body: normalize_body(&draft.body),
        version: next,
        published_at: draft.effective_at.filter(|at| *at > now).unwrap_or(now),
        created_by: draft.created_by,
        created_at: now,
    };

    if let Some(conn) = mutation.conn() {
        crate::db::legal_documents::insert(conn, &record)
            .await
            .map_err(|e| persist_failed("legal document", record.id, e))?;
    }

    mutation
        .audit(
            AuditEvent::new(AuditEventType::LegalContentCreated, "legal_document", record.id)
                .actor(caller.actor_type(), record.created_by.clone())
                .metadata(serde_json::json!({
                    "document_type": record.document_type.as_str(),
                    "locale": record.locale.as_str(),
                    "version": record.version,
                    "published_at": record.published_at,
                })),
        )
        .await?;

    let stored = record.clone();
    mutation.apply(move |s| s.legal_documents.append(stored));
    mutation.commit().await?;

    tracing::info!(
        id = %record.id,
        document_type = record.document_type.as_str(),
        locale = record.locale.as_str(),
        version = record.version,
        scheduled = record.published_at > now,
        "legal document published"
    );

    Ok(record)
}
