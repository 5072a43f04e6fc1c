//! # Service Layer
//!
//! Business operations shared by the JSON routes and the HTML pages. Each
//! mutation runs inside a [`Mutation`]:
//!
//! 1. take the state's write gate, so no other writer runs until step 4,
//! 2. build records from `enigma-core` rules and the current stores,
//! 3. write every row, audit events included, in one Postgres transaction,
//! 4. commit, then apply the same changes to the in-memory stores.
//!
//! A failed database write surfaces as 500 and leaves memory untouched, so
//! what the process serves never runs ahead of what is stored.

pub mod audit;
pub mod cookie_consent;
pub mod gdpr;
pub mod identification;
pub mod legal_content;
pub mod newsletter;

use chrono::Utc;
use sqlx::{PgConnection, Postgres, Transaction};
use tokio::sync::MutexGuard;

use crate::error::AppError;
use crate::state::{AppState, AuditRecord};

use self::audit::AuditEvent;

/// Log a failed database write and convert it into an opaque 500.
pub(crate) fn persist_failed(what: &str, id: impl std::fmt::Display, err: sqlx::Error) -> AppError {
    tracing::error!(entity = what, id = %id, error = %err, "database write failed");
    AppError::Internal(format!("{what} database persist failed"))
}

type Apply<'a> = Box<dyn FnOnce(&AppState) + Send + 'a>;

/// One mutation in flight.
///
/// Holds the write gate for its whole life. Dropping it without calling
/// [`Mutation::commit`] rolls the transaction back and discards the queued
/// in-memory changes.
pub(crate) struct Mutation<'a> {
    state: &'a AppState,
    gate: MutexGuard<'a, ()>,
    tx: Option<Transaction<'static, Postgres>>,
    audit: Vec<AuditRecord>,
    apply: Vec<Apply<'a>>,
}

impl<'a> Mutation<'a> {
    /// Wait for the write gate and open a transaction if a database is configured.
    pub(crate) async fn begin(state: &'a AppState) -> Result<Self, AppError> {
        let gate = state.write_gate.lock().await;
        let tx = match &state.db_pool {
            Some(pool) => Some(
                pool.begin()
                    .await
                    .map_err(|e| persist_failed("transaction", "begin", e))?,
            ),
            None => None,
        };
        Ok(Self {
            state,
            gate,
            tx,
            audit: Vec::new(),
            apply: Vec::new(),
        })
    }

    pub(crate) fn state(&self) -> &'a AppState {
        self.state
    }

    /// The open transaction, when running with a database.
    pub(crate) fn conn(&mut self) -> Option<&mut PgConnection> {
        self.tx.as_deref_mut()
    }

    /// Queue an in-memory change for after the commit.
    pub(crate) fn apply(&mut self, change: impl FnOnce(&AppState) + Send + 'a) {
        self.apply.push(Box::new(change));
    }

    /// Chain `event` after the last audit record, including ones queued by
    /// this mutation, and write it into the transaction.
    pub(crate) async fn audit(&mut self, event: AuditEvent) -> Result<AuditRecord, AppError> {
        let previous = match self.audit.last() {
            Some(queued) => Some(queued.clone()),
            None => self.state.audit_log.last(),
        };
        let record = audit::chain(previous.as_ref(), event, Utc::now());
        if let Some(conn) = self.conn() {
            crate::db::audit::insert(conn, &record)
                .await
                .map_err(|e| persist_failed("audit event", record.sequence, e))?;
        }
        tracing::debug!(
            sequence = record.sequence,
            event_type = record.event_type.as_str(),
            entity_type = %record.entity_type,
            "audit event appended"
        );
        self.audit.push(record.clone());
        Ok(record)
    }

    /// Commit the transaction, then apply the queued changes to memory.
    pub(crate) async fn commit(self) -> Result<(), AppError> {
        let Self {
            state,
            gate,
            tx,
            audit,
            apply,
        } = self;
        if let Some(tx) = tx {
            tx.commit()
                .await
                .map_err(|e| persist_failed("transaction", "commit", e))?;
        }
        for change in apply {
            change(state);
        }
        for record in audit {
            state.audit_log.append(record);
        }
        drop(gate);
        Ok(())
    }
}
