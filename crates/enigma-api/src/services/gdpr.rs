//! Data subject rights requests.
//!
//! Requests are answered by staff within [`RESPONSE_DEADLINE_DAYS`]. Status
//! changes follow [`GdprRequestStatus::transition`]; an invalid move is a
//! conflict with the stored state.
//!
//! [`RESPONSE_DEADLINE_DAYS`]: enigma_core::RESPONSE_DEADLINE_DAYS

use chrono::Utc;
use enigma_core::gdpr::due_date;
use enigma_core::{
    ActorType, AuditEventType, EmailAddress, GdprRequestStatus, GdprRequestType, Locale,
    ReferenceNumber,
};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::AuditEvent;
use super::{persist_failed, Mutation};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::ClientContext;
use crate::state::{AppState, GdprRequestRecord};

/// Longest accepted free-text description.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// A request as submitted by a data subject.
#[derive(Debug, Clone)]
pub struct GdprSubmission {
    pub request_type: GdprRequestType,
    pub email: EmailAddress,
    pub description: Option<String>,
    pub language: Locale,
}

/// Filters for the staff listing.
#[derive(Debug, Clone, Default)]
pub struct GdprFilter {
    pub status: Option<GdprRequestStatus>,
    pub request_type: Option<GdprRequestType>,
    pub email: Option<EmailAddress>,
}

/// One page of requests, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GdprRequestPage {
    pub items: Vec<GdprRequestRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// A reference no stored request uses. Callers hold the write gate, so the
/// check stays valid until the insert.
fn new_reference(state: &AppState, submitted_at: chrono::DateTime<Utc>) -> ReferenceNumber {
    let mut byte = [0u8; 1];
    loop {
        let reference = ReferenceNumber::generate(submitted_at, || {
            OsRng.fill_bytes(&mut byte);
            byte[0]
        });
        if state
            .gdpr_requests
            .find(|r| r.reference_number == reference)
            .is_none()
        {
            return reference;
        }
    }
}

/// Register a new request.
pub async fn submit(
    state: &AppState,
    submission: GdprSubmission,
    ctx: &ClientContext,
) -> Result<GdprRequestRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;
    let now = Utc::now();
    let customer_id = state
        .customers
        .find(|c| c.email == submission.email)
        .map(|c| c.id);

    let record = GdprRequestRecord {
        id: Uuid::new_v4(),
        reference_number: new_reference(state, now),
        request_type: submission.request_type,
        status: GdprRequestStatus::Pending,
        email: submission.email,
        customer_id,
        description: submission
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        language: submission.language,
        due_date: due_date(now),
        completed_at: None,
        response_notes: None,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
        created_at: now,
        updated_at: now,
    };

    if let Some(conn) = mutation.conn() {
        crate::db::gdpr_requests::insert(conn, &record)
            .await
            .map_err(|e| persist_failed("gdpr request", record.id, e))?;
    }

    let (actor_type, actor_id) = match customer_id {
        Some(id) => (ActorType::Customer, Some(id.to_string())),
        None => (ActorType::Anonymous, None),
    };
    mutation
        .audit(
            AuditEvent::new(AuditEventType::GdprRequestSubmitted, "gdpr_request", record.id)
                .actor(actor_type, actor_id)
                .metadata(serde_json::json!({
                    "reference_number": record.reference_number,
                    "request_type": record.request_type.as_str(),
                    "due_date": record.due_date,
                })),
        )
        .await?;

    let stored = record.clone();
    mutation.apply(move |s| {
        s.gdpr_requests.insert(stored.id, stored);
    });
    mutation.commit().await?;

    tracing::info!(
        id = %record.id,
        reference = %record.reference_number,
        request_type = record.request_type.as_str(),
        "gdpr request submitted"
    );

    Ok(record)
}

pub fn get(state: &AppState, id: Uuid) -> Result<GdprRequestRecord, AppError> {
    state
        .gdpr_requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("gdpr request {id} not found")))
}

/// Filtered, paginated listing. `page` starts at 1.
pub fn list(state: &AppState, filter: &GdprFilter, page: usize, limit: usize) -> GdprRequestPage {
    let page = page.max(1);
    let mut items: Vec<GdprRequestRecord> = state
        .gdpr_requests
        .list()
        .into_iter()
        .filter(|r| filter.status.map_or(true, |s| r.status == s))
        .filter(|r| filter.request_type.map_or(true, |t| r.request_type == t))
        .filter(|r| filter.email.as_ref().map_or(true, |e| &r.email == e))
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = items.len();
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    GdprRequestPage {
        items,
        total,
        page,
        limit,
    }
}

/// Move a request to `to`, optionally recording staff notes.
pub async fn update_status(
    state: &AppState,
    id: Uuid,
    to: GdprRequestStatus,
    response_notes: Option<String>,
    caller: &CallerIdentity,
) -> Result<GdprRequestRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;
    let now = Utc::now();

    let mut updated = get(state, id)?;
    let from = updated.status;
    updated.status = from.transition(to)?;
    updated.updated_at = now;
    if to.closes_request() {
        updated.completed_at = Some(now);
    }
    if let Some(notes) = response_notes.as_ref().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        updated.response_notes = Some(notes.to_string());
    }

    if let Some(conn) = mutation.conn() {
        crate::db::gdpr_requests::update_status(conn, &updated)
            .await
            .map_err(|e| persist_failed("gdpr request", updated.id, e))?;
    }

    mutation
        .audit(
            AuditEvent::new(AuditEventType::GdprRequestProcessed, "gdpr_request", updated.id)
                .actor(caller.actor_type(), None)
                .metadata(serde_json::json!({
                    "reference_number": updated.reference_number,
                    "from": from.as_str(),
                    "to": updated.status.as_str(),
                })),
        )
        .await?;

    let stored = updated.clone();
    mutation.apply(move |s| {
        s.gdpr_requests.insert(stored.id, stored);
    });
    mutation.commit().await?;

    tracing::info!(
        id = %updated.id,
        from = from.as_str(),
        to = updated.status.as_str(),
        "gdpr request status changed"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identification::identify;

    fn submission(email: &str, request_type: GdprRequestType) -> GdprSubmission {
        GdprSubmission {
            request_type,
            email: EmailAddress::new(email).unwrap(),
            description: Some("  Quiero una copia de mis datos  ".into()),
            language: Locale::Es,
        }
    }

    #[tokio::test]
    async fn submit_assigns_reference_and_deadline() {
        let state = AppState::new();
        let r = submit(&state, submission("ana@example.com", GdprRequestType::Access), &ClientContext::default())
            .await
            .unwrap();
        assert!(r.reference_number.as_str().starts_with("GDPR-"));
        assert_eq!(r.reference_number.as_str().rsplit('-').next().unwrap().len(), 9);
        assert_eq!(r.status, GdprRequestStatus::Pending);
        assert_eq!(r.due_date, r.created_at + chrono::Duration::days(30));
        assert_eq!(r.description.as_deref(), Some("Quiero una copia de mis datos"));
        assert!(r.customer_id.is_none());
        assert_eq!(get(&state, r.id).unwrap().id, r.id);
    }

    #[tokio::test]
    async fn known_email_links_customer() {
        let state = AppState::new();
        let ident = identify(&state, EmailAddress::new("ana@example.com").unwrap(), None)
            .await
            .unwrap();
        let r = submit(&state, submission("ana@example.com", GdprRequestType::Erasure), &ClientContext::default())
            .await
            .unwrap();
        assert_eq!(r.customer_id, Some(ident.customer.id));
    }

    #[tokio::test]
    async fn lifecycle_and_conflicts() {
        let state = AppState::new();
        let staff = CallerIdentity::staff();
        let r = submit(&state, submission("b@example.com", GdprRequestType::Portability), &ClientContext::default())
            .await
            .unwrap();

        let err = update_status(&state, r.id, GdprRequestStatus::Completed, None, &staff)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let r = update_status(&state, r.id, GdprRequestStatus::InProgress, None, &staff)
            .await
            .unwrap();
        assert!(r.completed_at.is_none());
        let r = update_status(&state, r.id, GdprRequestStatus::Completed, Some("Enviado".into()), &staff)
            .await
            .unwrap();
        assert!(r.completed_at.is_some());
        assert_eq!(r.response_notes.as_deref(), Some("Enviado"));

        let err = update_status(&state, r.id, GdprRequestStatus::Rejected, None, &staff)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let missing = update_status(&state, Uuid::new_v4(), GdprRequestStatus::InProgress, None, &staff)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let state = AppState::new();
        let ctx = ClientContext::default();
        for i in 0..5 {
            submit(&state, submission(&format!("u{i}@example.com"), GdprRequestType::Access), &ctx)
                .await
                .unwrap();
        }
        submit(&state, submission("z@example.com", GdprRequestType::Objection), &ctx)
            .await
            .unwrap();

        let all = list(&state, &GdprFilter::default(), 1, 4);
        assert_eq!(all.total, 6);
        assert_eq!(all.items.len(), 4);
        let second = list(&state, &GdprFilter::default(), 2, 4);
        assert_eq!(second.items.len(), 2);

        let objections = list(
            &state,
            &GdprFilter {
                request_type: Some(GdprRequestType::Objection),
                ..GdprFilter::default()
            },
            1,
            50,
        );
        assert_eq!(objections.total, 1);

        let by_email = list(
            &state,
            &GdprFilter {
                email: Some(EmailAddress::new("u3@example.com").unwrap()),
                ..GdprFilter::default()
            },
            1,
            50,
        );
        assert_eq!(by_email.total, 1);
    }
}
