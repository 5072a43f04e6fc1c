//! # Audit Hash Chain
//!
//! Every mutation in the service appends an audit event. Each event
//! carries the hash of its predecessor and its own hash:
//!
//! ```text
//! event_hash = SHA-256(previous_hash || event_type || entity_type || entity_id || sequence)
//! ```
//!
//! The first event chains from [`GENESIS_HASH`]. Editing or removing any
//! event breaks every link after it, which [`verify_chain`] detects.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Previous-hash value of the first event in the chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Cookie preferences were granted or changed.
    ConsentGiven,
    /// Cookie consent was withdrawn.
    ConsentWithdrawn,
    /// A new legal document version was published.
    LegalContentCreated,
    /// A newsletter visitor was matched to or created as a customer.
    CustomerIdentified,
    /// A newsletter subscription was created.
    NewsletterSubscribed,
    /// A newsletter subscription was cancelled.
    NewsletterUnsubscribed,
    /// A data subject rights request was received.
    GdprRequestSubmitted,
    /// A data subject rights request changed status.
    GdprRequestProcessed,
}

impl AuditEventType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentGiven => "consent_given",
            Self::ConsentWithdrawn => "consent_withdrawn",
            Self::LegalContentCreated => "legal_content_created",
            Self::CustomerIdentified => "customer_identified",
            Self::NewsletterSubscribed => "newsletter_subscribed",
            Self::NewsletterUnsubscribed => "newsletter_unsubscribed",
            Self::GdprRequestSubmitted => "gdpr_request_submitted",
            Self::GdprRequestProcessed => "gdpr_request_processed",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consent_given" => Ok(Self::ConsentGiven),
            "consent_withdrawn" => Ok(Self::ConsentWithdrawn),
            "legal_content_created" => Ok(Self::LegalContentCreated),
            "customer_identified" => Ok(Self::CustomerIdentified),
            "newsletter_subscribed" => Ok(Self::NewsletterSubscribed),
            "newsletter_unsubscribed" => Ok(Self::NewsletterUnsubscribed),
            "gdpr_request_submitted" => Ok(Self::GdprRequestSubmitted),
            "gdpr_request_processed" => Ok(Self::GdprRequestProcessed),
            other => Err(ValidationError::UnknownAuditKind {
                kind: "event type",
                value: other.to_string(),
            }),
        }
    }
}

/// Who caused the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// An identified customer.
    Customer,
    /// Restaurant staff using the service-role credential.
    Staff,
    /// The service itself.
    System,
    /// A visitor who has not identified.
    Anonymous,
}

impl ActorType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::System => "system",
            Self::Anonymous => "anonymous",
        }
    }
}

impl FromStr for ActorType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "system" => Ok(Self::System),
            "anonymous" => Ok(Self::Anonymous),
            other => Err(ValidationError::UnknownAuditKind {
                kind: "actor type",
                value: other.to_string(),
            }),
        }
    }
}

/// Hash of one chain link.
pub fn chain_hash(
    previous_hash: &str,
    event_type: AuditEventType,
    entity_type: &str,
    entity_id: &str,
    sequence: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(event_type.as_str().as_bytes());
    hasher.update(entity_type.as_bytes());
    hasher.update(entity_id.as_bytes());
    hasher.update(sequence.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Borrowed view of a stored audit event, enough to check the chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainLink<'a> {
    /// Position in the chain, starting at 1.
    pub sequence: u64,
    /// Event kind.
    pub event_type: AuditEventType,
    /// Kind of entity the event concerns.
    pub entity_type: &'a str,
    /// Identifier of the entity.
    pub entity_id: &'a str,
    /// Stored predecessor hash.
    pub previous_hash: &'a str,
    /// Stored hash of this event.
    pub event_hash: &'a str,
}

/// Result of walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Events inspected.
    pub total_events: usize,
    /// Events whose predecessor link or own hash does not match.
    pub broken_links: usize,
    /// `true` when no link is broken.
    pub chain_valid: bool,
}

/// Verify links ordered by ascending sequence.
///
/// A link is broken when its `previous_hash` differs from the preceding
/// event's hash (or from [`GENESIS_HASH`] for the first event), or when its
/// stored `event_hash` does not match the recomputed hash.
pub fn verify_chain<'a>(links: impl IntoIterator<Item = ChainLink<'a>>) -> ChainVerification {
    let mut total_events = 0;
    let mut broken_links = 0;
    let mut expected_prev = GENESIS_HASH.to_string();

    for link in links {
        total_events += 1;
        let recomputed = chain_hash(
            link.previous_hash,
            link.event_type,
            link.entity_type,
            link.entity_id,
            link.sequence,
        );
        if link.previous_hash != expected_prev || recomputed != link.event_hash {
            broken_links += 1;
        }
        expected_prev = link.event_hash.to_string();
    }

    ChainVerification {
        total_events,
        broken_links,
        chain_valid: broken_links == 0,
    }
}
