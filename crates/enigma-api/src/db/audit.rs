//! Audit event persistence: the immutable hash chain.
//!
//! Hashes are computed in the service layer under the audit ledger lock;
//! this module only stores and reloads them. `sequence` is unique, so two
//! writers racing on the same position fail loudly instead of forking the
//! chain.

use chrono::{DateTime, Utc};
use enigma_core::{ActorType, AuditEventType};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{collect_rows, parse_column};
use crate::state::AuditRecord;

/// Append an audit event.
pub async fn insert(conn: &mut PgConnection, record: &AuditRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO legal_audit_events (id, sequence, event_type, entity_type, entity_id,
         actor_type, actor_id, metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id)
    .bind(record.sequence as i64)
    .bind(record.event_type.as_str())
    .bind(&record.entity_type)
    .bind(&record.entity_id)
    .bind(record.actor_type.as_str())
    .bind(&record.actor_id)
    .bind(&record.metadata)
    .bind(&record.previous_hash)
    .bind(&record.event_hash)
    .bind(record.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Load the chain in sequence order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, sequence, event_type, entity_type, entity_id, actor_type, actor_id,
         metadata, previous_hash, event_hash, created_at
         FROM legal_audit_events ORDER BY sequence ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("legal_audit_events", rows, AuditEventRow::into_record))
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    sequence: i64,
    event_type: String,
    entity_type: String,
    entity_id: String,
    actor_type: String,
    actor_id: Option<String>,
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_record(self) -> Option<AuditRecord> {
        let event_type: AuditEventType =
            parse_column("legal_audit_events", "event_type", &self.event_type)?;
        let actor_type: ActorType = parse_column("legal_audit_events", "actor_type", &self.actor_type)?;
        Some(AuditRecord {
            id: self.id,
            sequence: u64::try_from(self.sequence).ok()?,
            event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            actor_type,
            actor_id: self.actor_id,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: self.created_at,
        })
    }
}
