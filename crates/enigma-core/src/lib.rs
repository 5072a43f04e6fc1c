#![deny(missing_docs)]

//! # enigma-core — Domain Types for the Enigma Legal Service
//!
//! Pure types and rules shared by the API layer. Nothing in this crate
//! touches the network or the database; every function is deterministic
//! given its inputs (callers pass `now` explicitly).
//!
//! ## Contents
//!
//! - [`legal`]: document types, locales, page routes, policy version labels.
//! - [`toc`]: heading extraction, table-of-contents nesting, summaries.
//! - [`consent`]: cookie categories, consent preferences, the retention
//!   window, banner decisions and consent statistics.
//! - [`customer`]: normalized email addresses and identification outcomes.
//! - [`gdpr`]: rights request types and the status lifecycle.
//! - [`audit`]: the SHA-256 hash chain over audit events.
//!
//! Validation failures are reported as [`ValidationError`]; lifecycle
//! violations as [`StateTransitionError`].

pub mod audit;
pub mod consent;
pub mod customer;
pub mod error;
pub mod gdpr;
pub mod legal;
pub mod toc;

pub use audit::{chain_hash, verify_chain, ActorType, AuditEventType, ChainLink, ChainVerification, GENESIS_HASH};
pub use consent::{
    BannerDecision, ConsentAction, ConsentEntry, ConsentMethod, ConsentPreferences,
    ConsentStatistics, CookieCategory, RetentionWindow, VisitorId, MAX_RETENTION_MONTHS,
};
pub use customer::{EmailAddress, IdentificationMethod};
pub use error::{StateTransitionError, ValidationError};
pub use gdpr::{GdprRequestStatus, GdprRequestType, ReferenceNumber, RESPONSE_DEADLINE_DAYS};
pub use legal::{LegalDocumentType, Locale, DEFAULT_POLICY_VERSION};
pub use toc::{Block, Heading, TocEntry};
