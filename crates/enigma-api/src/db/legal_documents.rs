//! Legal document persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `legal_documents`
//! table. Rows are never updated: a new version is a new row.

use chrono::{DateTime, Utc};
use enigma_core::{LegalDocumentType, Locale};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{collect_rows, parse_column};
use crate::state::LegalDocumentRecord;

/// Insert a published document version.
pub async fn insert(conn: &mut PgConnection, record: &LegalDocumentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO legal_documents (id, document_type, locale, title, body, version,
         published_at, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id)
    .bind(record.document_type.as_str())
    .bind(record.locale.as_str())
    .bind(&record.title)
    .bind(&record.body)
    .bind(record.version as i32)
    .bind(record.published_at)
    .bind(&record.created_by)
    .bind(record.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Load every document version, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<LegalDocumentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LegalDocumentRow>(
        "SELECT id, document_type, locale, title, body, version, published_at,
         created_by, created_at
         FROM legal_documents ORDER BY created_at, version",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("legal_documents", rows, LegalDocumentRow::into_record))
}

#[derive(sqlx::FromRow)]
struct LegalDocumentRow {
    id: Uuid,
    document_type: String,
    locale: String,
    title: String,
    body: String,
    version: i32,
    published_at: DateTime<Utc>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl LegalDocumentRow {
    fn into_record(self) -> Option<LegalDocumentRecord> {
        let document_type: LegalDocumentType =
            parse_column("legal_documents", "document_type", &self.document_type)?;
        let locale: Locale = parse_column("legal_documents", "locale", &self.locale)?;
        Some(LegalDocumentRecord {
            id: self.id,
            document_type,
            locale,
            title: self.title,
            body: self.body,
            version: u32::try_from(self.version).ok()?,
            published_at: self.published_at,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}
