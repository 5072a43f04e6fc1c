//! Newsletter subscription persistence operations.

use chrono::{DateTime, Utc};
use enigma_core::EmailAddress;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::collect_rows;
use crate::state::NewsletterSubscriptionRecord;

/// Insert a new subscription.
pub async fn insert(conn: &mut PgConnection, record: &NewsletterSubscriptionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO newsletter_subscriptions (id, email, customer_id, source,
         subscribed_at, unsubscribed_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id)
    .bind(record.email.as_str())
    .bind(record.customer_id)
    .bind(&record.source)
    .bind(record.subscribed_at)
    .bind(record.unsubscribed_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Stamp a subscription as cancelled.
pub async fn mark_unsubscribed(
    conn: &mut PgConnection,
    id: Uuid,
    unsubscribed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE newsletter_subscriptions SET unsubscribed_at = $1
         WHERE id = $2 AND unsubscribed_at IS NULL",
    )
    .bind(unsubscribed_at)
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every subscription.
pub async fn load_all(pool: &PgPool) -> Result<Vec<NewsletterSubscriptionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT id, email, customer_id, source, subscribed_at, unsubscribed_at
         FROM newsletter_subscriptions ORDER BY subscribed_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(collect_rows("newsletter_subscriptions", rows, |row| {
        Some(NewsletterSubscriptionRecord {
            id: row.id,
            email: EmailAddress::new(row.email).ok()?,
            customer_id: row.customer_id,
            source: row.source,
            subscribed_at: row.subscribed_at,
            unsubscribed_at: row.unsubscribed_at,
        })
    }))
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    email: String,
    customer_id: Uuid,
    source: String,
    subscribed_at: DateTime<Utc>,
    unsubscribed_at: Option<DateTime<Utc>>,
}
