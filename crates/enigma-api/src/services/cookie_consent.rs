//! Cookie consent trail.
//!
//! Every decision is a new entry; nothing is updated in place. A visitor's
//! current decision is their entry with the highest sequence, which is also
//! the last one in ledger order.

use chrono::{DateTime, Duration, Utc};
use enigma_core::{
    ActorType, AuditEventType, BannerDecision, ConsentAction, ConsentMethod, ConsentPreferences,
    ConsentStatistics, CookieCategory, VisitorId,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::AuditEvent;
use super::{identification, legal_content, persist_failed, Mutation};
use crate::error::AppError;
use crate::extractors::ClientContext;
use crate::state::{AppState, CookieConsentRecord, CustomerIdentity};

/// Whether a visitor must see the banner, and why.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsentStatus {
    #[schema(value_type = String)]
    pub visitor_id: VisitorId,
    pub show_banner: bool,
    #[schema(value_type = String, example = "no_consent")]
    pub reason: BannerDecision,
    pub current_policy_version: String,
    pub consent: Option<CookieConsentRecord>,
    pub identity: CustomerIdentity,
    /// Categories scripts may use right now. Only `necessary` unless the
    /// current decision is valid.
    pub allowed_categories: Vec<String>,
}

/// Aggregates over a reporting period.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsentStatisticsReport {
    pub period_days: u32,
    pub since: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub statistics: ConsentStatistics,
}

fn actor_for(state: &AppState, visitor: &VisitorId) -> (ActorType, Option<String>) {
    match identification::lookup_identity(state, visitor).customer_id {
        Some(customer_id) => (ActorType::Customer, Some(customer_id.to_string())),
        None => (ActorType::Anonymous, Some(visitor.to_string())),
    }
}

async fn append(
    state: &AppState,
    visitor: VisitorId,
    action: ConsentAction,
    preferences: ConsentPreferences,
    method: ConsentMethod,
    ctx: &ClientContext,
) -> Result<CookieConsentRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;

    if action == ConsentAction::Withdrawn && current(state, &visitor).is_none() {
        return Err(AppError::NotFound(format!(
            "no consent on record for visitor {visitor}"
        )));
    }

    let granted_at = Utc::now();
    let record = CookieConsentRecord {
        id: Uuid::new_v4(),
        sequence: state.consents.last().map_or(1, |last| last.sequence + 1),
        visitor_id: visitor,
        action,
        preferences: preferences.normalized(),
        method,
        policy_version: legal_content::current_policy_version(state, granted_at),
        granted_at,
        expires_at: state.config.retention.expiry_for(granted_at),
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
    };

    if let Some(conn) = mutation.conn() {
        crate::db::consents::insert(conn, &record)
            .await
            .map_err(|e| persist_failed("cookie consent", record.id, e))?;
    }

    let event_type = match action {
        ConsentAction::Granted => AuditEventType::ConsentGiven,
        ConsentAction::Withdrawn => AuditEventType::ConsentWithdrawn,
    };
    let (actor_type, actor_id) = actor_for(state, &record.visitor_id);
    mutation
        .audit(
            AuditEvent::new(event_type, "cookie_consent", record.id)
                .actor(actor_type, actor_id)
                .metadata(serde_json::json!({
                    "visitor_id": record.visitor_id,
                    "method": record.method.as_str(),
                    "policy_version": record.policy_version,
                    "preferences": record.preferences,
                })),
        )
        .await?;

    let stored = record.clone();
    mutation.apply(move |s| s.consents.append(stored));
    mutation.commit().await?;

    tracing::info!(
        id = %record.id,
        sequence = record.sequence,
        action = record.action.as_str(),
        method = record.method.as_str(),
        policy_version = %record.policy_version,
        "cookie consent recorded"
    );

    Ok(record)
}

/// Record a grant (or change) of cookie preferences.
pub async fn record(
    state: &AppState,
    visitor: VisitorId,
    preferences: ConsentPreferences,
    method: ConsentMethod,
    ctx: &ClientContext,
) -> Result<CookieConsentRecord, AppError> {
    append(state, visitor, ConsentAction::Granted, preferences, method, ctx).await
}

/// Record a withdrawal. Only necessary cookies remain allowed afterwards.
pub async fn withdraw(
    state: &AppState,
    visitor: VisitorId,
    method: ConsentMethod,
    ctx: &ClientContext,
) -> Result<CookieConsentRecord, AppError> {
    append(
        state,
        visitor,
        ConsentAction::Withdrawn,
        ConsentPreferences::necessary_only(),
        method,
        ctx,
    )
    .await
}

/// Most recent entry for `visitor`.
pub fn current(state: &AppState, visitor: &VisitorId) -> Option<CookieConsentRecord> {
    state.consents.last_matching(|c| &c.visitor_id == visitor)
}

/// Full trail for `visitor`, oldest first.
pub fn history(state: &AppState, visitor: &VisitorId) -> Vec<CookieConsentRecord> {
    state.consents.filter(|c| &c.visitor_id == visitor)
}

/// Banner decision for `visitor` at `now`.
pub fn status(state: &AppState, visitor: VisitorId, now: DateTime<Utc>) -> ConsentStatus {
    let current_policy_version = legal_content::current_policy_version(state, now);
    let consent = current(state, &visitor);
    let reason = BannerDecision::evaluate(
        consent.as_ref().map(CookieConsentRecord::entry).as_ref(),
        &current_policy_version,
        now,
    );
    let allowed_categories = CookieCategory::ALL
        .into_iter()
        .filter(|category| match (&consent, reason) {
            (Some(c), BannerDecision::Valid) => c.preferences.allows(*category),
            _ => *category == CookieCategory::Necessary,
        })
        .map(|category| category.as_str().to_string())
        .collect();

    ConsentStatus {
        identity: identification::lookup_identity(state, &visitor),
        visitor_id: visitor,
        show_banner: reason.shows_banner(),
        reason,
        current_policy_version,
        consent,
        allowed_categories,
    }
}

/// Statistics over the last `days` days.
pub fn statistics(state: &AppState, days: u32, now: DateTime<Utc>) -> ConsentStatisticsReport {
    let since = now - Duration::days(i64::from(days));
    let statistics = state.consents.with_entries(|entries| {
        ConsentStatistics::compute(entries.iter().map(CookieConsentRecord::entry), since, now)
    });
    ConsentStatisticsReport {
        period_days: days,
        since,
        statistics,
    }
}
