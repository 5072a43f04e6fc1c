//! Audit trail over every mutation.
//!
//! Sequence numbers and chained hashes are assigned while a [`Mutation`]
//! holds the write gate, so concurrent writers cannot fork the chain.

use chrono::{DateTime, Utc};
use enigma_core::{chain_hash, verify_chain, ActorType, AuditEventType, ChainVerification, GENESIS_HASH};
use uuid::Uuid;

use super::Mutation;
use crate::error::AppError;
use crate::state::{AppState, AuditRecord};

/// An event about to be appended.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, entity_type: &'static str, entity_id: impl ToString) -> Self {
        Self {
            event_type,
            entity_type,
            entity_id: entity_id.to_string(),
            actor_type: ActorType::System,
            actor_id: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn actor(mut self, actor_type: ActorType, actor_id: Option<String>) -> Self {
        self.actor_type = actor_type;
        self.actor_id = actor_id;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Build the link that follows `previous` (or the genesis hash).
pub(crate) fn chain(previous: Option<&AuditRecord>, event: AuditEvent, created_at: DateTime<Utc>) -> AuditRecord {
    let (sequence, previous_hash) = previous.map_or_else(
        || (1, GENESIS_HASH.to_string()),
        |last| (last.sequence + 1, last.event_hash.clone()),
    );
    let event_hash = chain_hash(
        &previous_hash,
        event.event_type,
        event.entity_type,
        &event.entity_id,
        sequence,
    );
    AuditRecord {
        id: Uuid::new_v4(),
        sequence,
        event_type: event.event_type,
        entity_type: event.entity_type.to_string(),
        entity_id: event.entity_id,
        actor_type: event.actor_type,
        actor_id: event.actor_id,
        metadata: event.metadata,
        previous_hash,
        event_hash,
        created_at,
    }
}

/// Append a standalone event to the chain and persist it.
pub async fn record(state: &AppState, event: AuditEvent) -> Result<AuditRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;
    let record = mutation.audit(event).await?;
    mutation.commit().await?;
    Ok(record)
}

/// Events, oldest first, optionally narrowed to one entity type and id.
/// At most `limit` of the most recent matches are returned.
pub fn events(
    state: &AppState,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
    limit: usize,
) -> Vec<AuditRecord> {
    let matching = state.audit_log.filter(|e| {
        entity_type.map_or(true, |t| e.entity_type == t) && entity_id.map_or(true, |id| e.entity_id == id)
    });
    let skip = matching.len().saturating_sub(limit);
    matching.into_iter().skip(skip).collect()
}

/// Walk the whole chain.
pub fn verify(state: &AppState) -> ChainVerification {
    state
        .audit_log
        .with_entries(|entries| verify_chain(entries.iter().map(AuditRecord::link)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appended_events_form_a_valid_chain() {
        let state = AppState::new();
        for i in 0..5 {
            record(
                &state,
                AuditEvent::new(AuditEventType::ConsentGiven, "cookie_consent", format!("c-{i}")),
            )
            .await
            .unwrap();
        }
        let v = verify(&state);
        assert_eq!(v.total_events, 5);
        assert!(v.chain_valid);

        let all = state.audit_log.list();
        assert_eq!(all[0].previous_hash, GENESIS_HASH);
        assert_eq!(all[1].previous_hash, all[0].event_hash);
        assert_eq!(all[4].sequence, 5);
    }

    #[tokio::test]
    async fn events_filter_and_limit() {
        let state = AppState::new();
        for (ty, id) in [("gdpr_request", "a"), ("cookie_consent", "b"), ("gdpr_request", "c")] {
            record(&state, AuditEvent::new(AuditEventType::GdprRequestSubmitted, ty, id))
                .await
                .unwrap();
        }
        let gdpr = events(&state, Some("gdpr_request"), None, 100);
        assert_eq!(gdpr.len(), 2);
        let latest = events(&state, None, None, 1);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].entity_id, "c");
        assert_eq!(events(&state, Some("gdpr_request"), Some("a"), 10).len(), 1);
    }

    #[tokio::test]
    async fn builder_sets_actor_and_metadata() {
        let state = AppState::new();
        let rec = record(
            &state,
            AuditEvent::new(AuditEventType::LegalContentCreated, "legal_document", "x")
                .actor(ActorType::Staff, None)
                .metadata(serde_json::json!({ "version": 2 })),
        )
        .await
        .unwrap();
        assert_eq!(rec.actor_type, ActorType::Staff);
        assert_eq!(rec.metadata["version"], 2);
    }
}
