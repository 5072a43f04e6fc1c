//! Customer and identity link persistence operations.
//!
//! Both inserts are idempotent (`ON CONFLICT DO NOTHING`), so repeating an
//! identification after a failed write converges on the same rows.

use chrono::{DateTime, Utc};
use enigma_core::{EmailAddress, VisitorId};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::collect_rows;
use crate::state::{CustomerRecord, IdentityLink};

/// Insert a customer unless one with the same email exists.
pub async fn insert(conn: &mut PgConnection, record: &CustomerRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO customers (id, email, created_at) VALUES ($1, $2, $3)
         ON CONFLICT (email) DO NOTHING",
    )
    .bind(record.id)
    .bind(record.email.as_str())
    .bind(record.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Link a visitor to a customer.
pub async fn insert_link(conn: &mut PgConnection, link: &IdentityLink) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO customer_identities (visitor_id, customer_id, linked_at) VALUES ($1, $2, $3)
         ON CONFLICT (visitor_id, customer_id) DO NOTHING",
    )
    .bind(link.visitor_id.as_str())
    .bind(link.customer_id)
    .bind(link.linked_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Load every customer.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CustomerRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, email, created_at FROM customers ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("customers", rows, |row| {
        Some(CustomerRecord {
            id: row.id,
            email: EmailAddress::new(row.email).ok()?,
            created_at: row.created_at,
        })
    }))
}

/// Load every identity link, oldest first.
pub async fn load_links(pool: &PgPool) -> Result<Vec<IdentityLink>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IdentityLinkRow>(
        "SELECT visitor_id, customer_id, linked_at FROM customer_identities ORDER BY linked_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("customer_identities", rows, |row| {
        Some(IdentityLink {
            visitor_id: VisitorId::new(row.visitor_id).ok()?,
            customer_id: row.customer_id,
            linked_at: row.linked_at,
        })
    }))
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct IdentityLinkRow {
    visitor_id: String,
    customer_id: Uuid,
    linked_at: DateTime<Utc>,
}
