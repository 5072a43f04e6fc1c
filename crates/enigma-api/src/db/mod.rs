//! # Database Persistence Layer
//!
//! Provides Postgres persistence for the legal service via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! mutation is written through to PostgreSQL and the in-memory stores are
//! hydrated from it on startup. When absent, the API operates in
//! in-memory-only mode (suitable for development and testing).
//!
//! ## What is persisted
//!
//! - Legal document versions (append-only)
//! - Cookie consent trail (append-only)
//! - Customers and visitor identity links
//! - Newsletter subscriptions
//! - GDPR rights requests
//! - Audit event log (append-only hash chain)
//!
//! Append-only tables are protected by `DO INSTEAD NOTHING` rules in the
//! initial migration, so even a misbehaving client cannot rewrite them.

pub mod audit;
pub mod consents;
pub mod customers;
pub mod gdpr_requests;
pub mod legal_documents;
pub mod newsletter;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set; running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Parse a stored enum column, logging and discarding unknown values.
pub(crate) fn parse_column<T: std::str::FromStr>(table: &str, column: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(table, column, value, "unknown value in database row");
            None
        }
    }
}

/// Keep the rows that map to records, logging the rest.
pub(crate) fn collect_rows<R, T>(table: &str, rows: Vec<R>, into_record: impl Fn(R) -> Option<T>) -> Vec<T> {
    let total = rows.len();
    let records: Vec<T> = rows.into_iter().filter_map(into_record).collect();
    if records.len() != total {
        tracing::error!(
            table,
            skipped = total - records.len(),
            "skipping rows that could not be mapped during load_all"
        );
    }
    records
}
