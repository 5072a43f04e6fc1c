//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Legal documents**: append-only ledger of every published version.
//! - **Cookie consents**: append-only ledger; a visitor's current decision
//!   is their entry with the highest sequence.
//! - **Customers** and **identity links**: email-keyed customers and the
//!   visitors linked to them.
//! - **Newsletter subscriptions** and **GDPR requests**: mutable records.
//! - **Audit log**: append-only SHA-256 hash chain.
//!
//! The in-memory stores are authoritative for reads. When a database pool
//! is configured every mutation is written to Postgres first and the
//! stores are hydrated from it on startup. Writers are serialized by
//! [`AppState::write_gate`]; see [`crate::services`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use enigma_core::{
    ActorType, AuditEventType, ChainLink, ConsentAction, ConsentEntry, ConsentMethod,
    ConsentPreferences, EmailAddress, GdprRequestStatus, GdprRequestType, LegalDocumentType, Locale,
    ReferenceNumber, VisitorId,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync, K: Eq + Hash + Clone + Send + Sync = Uuid> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<T: Clone + Send + Sync, K: Eq + Hash + Clone + Send + Sync> Clone for Store<T, K> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync, K: Eq + Hash + Clone + Send + Sync> Store<T, K> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records, in no particular order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync, K: Eq + Hash + Clone + Send + Sync> Default for Store<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Append-Only Ledger -------------------------------------------------------

/// Thread-safe append-only sequence of records.
///
/// There is no update or remove: corrections are new entries. Entries keep
/// insertion order, which is also sequence order.
#[derive(Debug)]
pub struct Ledger<T: Clone + Send + Sync> {
    entries: Arc<RwLock<Vec<T>>>,
}

impl<T: Clone + Send + Sync> Clone for Ledger<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Clone + Send + Sync> Ledger<T> {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a record.
    pub fn append(&self, value: T) {
        self.entries.write().push(value);
    }

    /// Every entry, oldest first.
    pub fn list(&self) -> Vec<T> {
        self.entries.read().clone()
    }

    /// Entries matching `pred`, oldest first.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.entries.read().iter().filter(|v| pred(v)).cloned().collect()
    }

    /// First entry matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.entries.read().iter().find(|v| pred(v)).cloned()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<T> {
        self.entries.read().last().cloned()
    }

    /// Most recent entry matching `pred`.
    pub fn last_matching(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.entries.read().iter().rev().find(|v| pred(v)).cloned()
    }

    /// Run `f` over the entries without cloning them.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.entries.read())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Ledger<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Types -------------------------------------------------------------

/// One published version of a legal document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LegalDocumentRecord {
    pub id: Uuid,
    #[schema(value_type = String, example = "privacy_policy")]
    pub document_type: LegalDocumentType,
    #[schema(value_type = String, example = "es")]
    pub locale: Locale,
    pub title: String,
    /// Body text with `#` heading markers.
    pub body: String,
    /// Per (type, locale) version, starting at 1.
    pub version: u32,
    /// When this version becomes current. May be in the future.
    pub published_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LegalDocumentRecord {
    /// Whether the version is live at `now`.
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.published_at <= now
    }
}

/// One entry in a visitor's cookie consent trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CookieConsentRecord {
    pub id: Uuid,
    /// Global append order.
    pub sequence: u64,
    #[schema(value_type = String)]
    pub visitor_id: VisitorId,
    #[schema(value_type = String, example = "granted")]
    pub action: ConsentAction,
    #[schema(value_type = Object)]
    pub preferences: ConsentPreferences,
    #[schema(value_type = String, example = "banner")]
    pub method: ConsentMethod,
    /// Privacy policy version in force when the decision was made.
    pub policy_version: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CookieConsentRecord {
    /// Borrowed view used by the banner and statistics rules.
    pub fn entry(&self) -> ConsentEntry<'_> {
        ConsentEntry {
            visitor_id: self.visitor_id.as_str(),
            sequence: self.sequence,
            action: self.action,
            method: self.method,
            preferences: self.preferences,
            policy_version: &self.policy_version,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
        }
    }
}

/// A known customer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerRecord {
    pub id: Uuid,
    #[schema(value_type = String, example = "ana@example.com")]
    pub email: EmailAddress,
    pub created_at: DateTime<Utc>,
}

/// Stored link between a visitor and a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLink {
    pub visitor_id: VisitorId,
    pub customer_id: Uuid,
    pub linked_at: DateTime<Utc>,
}

/// A visitor together with the customer they were identified as, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerIdentity {
    #[schema(value_type = String)]
    pub visitor_id: VisitorId,
    pub customer_id: Option<Uuid>,
    pub linked_at: Option<DateTime<Utc>>,
}

/// Newsletter subscription.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewsletterSubscriptionRecord {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub email: EmailAddress,
    pub customer_id: Uuid,
    /// Where the signup happened (footer, checkout, popup...).
    pub source: String,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl NewsletterSubscriptionRecord {
    /// Whether the subscription is still in force.
    pub fn is_active(&self) -> bool {
        self.unsubscribed_at.is_none()
    }
}

/// Data subject rights request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GdprRequestRecord {
    pub id: Uuid,
    #[schema(value_type = String, example = "GDPR-1718000000000-K3Z9Q0A1B")]
    pub reference_number: ReferenceNumber,
    #[schema(value_type = String, example = "access")]
    pub request_type: GdprRequestType,
    #[schema(value_type = String, example = "pending")]
    pub status: GdprRequestStatus,
    #[schema(value_type = String)]
    pub email: EmailAddress,
    pub customer_id: Option<Uuid>,
    pub description: Option<String>,
    #[schema(value_type = String, example = "es")]
    pub language: Locale,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One link of the audit hash chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecord {
    pub id: Uuid,
    pub sequence: u64,
    #[schema(value_type = String, example = "consent_given")]
    pub event_type: AuditEventType,
    pub entity_type: String,
    pub entity_id: String,
    #[schema(value_type = String, example = "anonymous")]
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub metadata: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Borrowed view used for chain verification.
    pub fn link(&self) -> ChainLink<'_> {
        ChainLink {
            sequence: self.sequence,
            event_type: self.event_type,
            entity_type: &self.entity_type,
            entity_id: &self.entity_id,
            previous_hash: &self.previous_hash,
            event_hash: &self.event_hash,
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each store.
#[derive(Debug, Clone)]
pub struct AppState {
    pub legal_documents: Ledger<LegalDocumentRecord>,
    pub consents: Ledger<CookieConsentRecord>,
    pub customers: Store<CustomerRecord>,
    pub identity_links: Ledger<IdentityLink>,
    pub subscriptions: Store<NewsletterSubscriptionRecord>,
    pub gdpr_requests: Store<GdprRequestRecord>,
    pub audit_log: Ledger<AuditRecord>,

    /// Held by every mutation from its first read until its changes are
    /// applied. Readers never take it.
    pub write_gate: Arc<tokio::sync::Mutex<()>>,

    /// PostgreSQL connection pool. When `None`, the API runs in-memory only.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            legal_documents: Ledger::new(),
            consents: Ledger::new(),
            customers: Store::new(),
            identity_links: Ledger::new(),
            subscriptions: Store::new(),
            gdpr_requests: Store::new(),
            audit_log: Ledger::new(),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            db_pool,
            config,
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available. Ledgers
    /// are loaded in sequence order so that the next append continues the
    /// stored sequence and hash chain.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let documents = crate::db::legal_documents::load_all(pool).await?;
        let document_count = documents.len();
        for record in documents {
            self.legal_documents.append(record);
        }

        let consents = crate::db::consents::load_all(pool).await?;
        let consent_count = consents.len();
        for record in consents {
            self.consents.append(record);
        }

        let customers = crate::db::customers::load_all(pool).await?;
        let customer_count = customers.len();
        for record in customers {
            self.customers.insert(record.id, record);
        }

        for link in crate::db::customers::load_links(pool).await? {
            self.identity_links.append(link);
        }

        for record in crate::db::newsletter::load_all(pool).await? {
            self.subscriptions.insert(record.id, record);
        }

        let requests = crate::db::gdpr_requests::load_all(pool).await?;
        let request_count = requests.len();
        for record in requests {
            self.gdpr_requests.insert(record.id, record);
        }

        let audit = crate::db::audit::load_all(pool).await?;
        let audit_count = audit.len();
        for record in audit {
            self.audit_log.append(record);
        }

        tracing::info!(
            legal_documents = document_count,
            consents = consent_count,
            customers = customer_count,
            gdpr_requests = request_count,
            audit_events = audit_count,
            "hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
