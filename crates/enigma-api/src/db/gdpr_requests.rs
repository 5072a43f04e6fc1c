//! GDPR rights request persistence operations.

use chrono::{DateTime, Utc};
use enigma_core::{EmailAddress, GdprRequestStatus, GdprRequestType, Locale, ReferenceNumber};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{collect_rows, parse_column};
use crate::state::GdprRequestRecord;

/// Insert a newly submitted request.
pub async fn insert(conn: &mut PgConnection, record: &GdprRequestRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO gdpr_requests (id, reference_number, request_type, status, email,
         customer_id, description, language, due_date, completed_at, response_notes,
         ip_address, user_agent, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(record.id)
    .bind(record.reference_number.as_str())
    .bind(record.request_type.as_str())
    .bind(record.status.as_str())
    .bind(record.email.as_str())
    .bind(record.customer_id)
    .bind(&record.description)
    .bind(record.language.as_str())
    .bind(record.due_date)
    .bind(record.completed_at)
    .bind(&record.response_notes)
    .bind(&record.ip_address)
    .bind(&record.user_agent)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Persist a status change.
pub async fn update_status(conn: &mut PgConnection, record: &GdprRequestRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE gdpr_requests SET status = $1, completed_at = $2, response_notes = $3,
         updated_at = $4 WHERE id = $5",
    )
    .bind(record.status.as_str())
    .bind(record.completed_at)
    .bind(&record.response_notes)
    .bind(record.updated_at)
    .bind(record.id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every request.
pub async fn load_all(pool: &PgPool) -> Result<Vec<GdprRequestRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, GdprRequestRow>(
        "SELECT id, reference_number, request_type, status, email, customer_id,
         description, language, due_date, completed_at, response_notes,
         ip_address, user_agent, created_at, updated_at
         FROM gdpr_requests ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("gdpr_requests", rows, GdprRequestRow::into_record))
}

#[derive(sqlx::FromRow)]
struct GdprRequestRow {
    id: Uuid,
    reference_number: String,
    request_type: String,
    status: String,
    email: String,
    customer_id: Option<Uuid>,
    description: Option<String>,
    language: String,
    due_date: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    response_notes: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GdprRequestRow {
    fn into_record(self) -> Option<GdprRequestRecord> {
        let request_type: GdprRequestType =
            parse_column("gdpr_requests", "request_type", &self.request_type)?;
        let status: GdprRequestStatus = parse_column("gdpr_requests", "status", &self.status)?;
        let language: Locale = parse_column("gdpr_requests", "language", &self.language)?;
        Some(GdprRequestRecord {
            id: self.id,
            reference_number: ReferenceNumber::from_stored(self.reference_number),
            request_type,
            status,
            email: EmailAddress::new(self.email).ok()?,
            customer_id: self.customer_id,
            description: self.description,
            language,
            due_date: self.due_date,
            completed_at: self.completed_at,
            response_notes: self.response_notes,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
