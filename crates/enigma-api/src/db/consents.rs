//! Cookie consent persistence operations.
//!
//! The `cookie_consents` table is append-only; a withdrawal is a new row.

use chrono::{DateTime, Utc};
use enigma_core::{ConsentAction, ConsentMethod, ConsentPreferences, VisitorId};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{collect_rows, parse_column};
use crate::state::CookieConsentRecord;

/// Append a consent entry.
pub async fn insert(conn: &mut PgConnection, record: &CookieConsentRecord) -> Result<(), sqlx::Error> {
    let preferences = serde_json::to_value(record.preferences)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO cookie_consents (id, sequence, visitor_id, action, preferences, method,
         policy_version, granted_at, expires_at, ip_address, user_agent)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id)
    .bind(record.sequence as i64)
    .bind(record.visitor_id.as_str())
    .bind(record.action.as_str())
    .bind(preferences)
    .bind(record.method.as_str())
    .bind(&record.policy_version)
    .bind(record.granted_at)
    .bind(record.expires_at)
    .bind(&record.ip_address)
    .bind(&record.user_agent)
    .execute(conn)
    .await?;

    Ok(())
}

/// Load the whole consent trail in sequence order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CookieConsentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConsentRow>(
        "SELECT id, sequence, visitor_id, action, preferences, method, policy_version,
         granted_at, expires_at, ip_address, user_agent
         FROM cookie_consents ORDER BY sequence",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("cookie_consents", rows, ConsentRow::into_record))
}

#[derive(sqlx::FromRow)]
struct ConsentRow {
    id: Uuid,
    sequence: i64,
    visitor_id: String,
    action: String,
    preferences: serde_json::Value,
    method: String,
    policy_version: String,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl ConsentRow {
    fn into_record(self) -> Option<CookieConsentRecord> {
        let action: ConsentAction = parse_column("cookie_consents", "action", &self.action)?;
        let method: ConsentMethod = parse_column("cookie_consents", "method", &self.method)?;
        let preferences: ConsentPreferences = match serde_json::from_value(self.preferences) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "unreadable consent preferences");
                return None;
            }
        };
        Some(CookieConsentRecord {
            id: self.id,
            sequence: u64::try_from(self.sequence).ok()?,
            visitor_id: VisitorId::new(self.visitor_id).ok()?,
            action,
            preferences: preferences.normalized(),
            method,
            policy_version: self.policy_version,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        })
    }
}
