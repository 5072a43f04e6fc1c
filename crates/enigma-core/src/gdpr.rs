//! # GDPR Rights Requests
//!
//! Data subjects may ask for access, rectification, erasure, portability,
//! restriction or objection. Every request receives a human-quotable
//! reference number and must be answered within thirty days.
//!
//! ## Status lifecycle
//!
//! ```text
//! pending ──► in_progress ──► completed
//!    │             │
//!    ├──► rejected ◄┤
//!    └──► expired  ◄┘
//! ```
//!
//! `completed`, `rejected` and `expired` are terminal.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StateTransitionError, ValidationError};

/// Days allowed to answer a request.
pub const RESPONSE_DEADLINE_DAYS: i64 = 30;

const REFERENCE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random characters after the timestamp.
const REFERENCE_SUFFIX_LEN: usize = 9;

/// Largest multiple of 36 that fits in a byte; higher bytes are rejected.
const REFERENCE_BYTE_LIMIT: u8 = 252;

/// Right being exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GdprRequestType {
    /// Copy of the personal data held (Art. 15).
    Access,
    /// Correction of inaccurate data (Art. 16).
    Rectification,
    /// Deletion (Art. 17).
    Erasure,
    /// Machine-readable export (Art. 20).
    Portability,
    /// Restriction of processing (Art. 18).
    Restriction,
    /// Objection to processing (Art. 21).
    Objection,
}

impl GdprRequestType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Rectification => "rectification",
            Self::Erasure => "erasure",
            Self::Portability => "portability",
            Self::Restriction => "restriction",
            Self::Objection => "objection",
        }
    }
}

impl FromStr for GdprRequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "access" => Ok(Self::Access),
            "rectification" => Ok(Self::Rectification),
            "erasure" => Ok(Self::Erasure),
            "portability" => Ok(Self::Portability),
            "restriction" => Ok(Self::Restriction),
            "objection" => Ok(Self::Objection),
            other => Err(ValidationError::UnknownGdprRequestType(other.to_string())),
        }
    }
}

/// Processing status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GdprRequestStatus {
    /// Received, not yet picked up.
    Pending,
    /// Being worked on by staff.
    InProgress,
    /// Answered.
    Completed,
    /// Refused (e.g. identity could not be verified).
    Rejected,
    /// Deadline passed without an answer.
    Expired,
}

impl GdprRequestStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Expired)
    }

    /// Entering this status closes the request with a `completed_at` stamp.
    pub fn closes_request(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Validate a move from `self` to `to`.
    pub fn transition(self, to: Self) -> Result<Self, StateTransitionError> {
        if self.is_terminal() {
            return Err(StateTransitionError::AlreadyTerminal {
                state: self.as_str().to_string(),
            });
        }
        let allowed = matches!(
            (self, to),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Expired)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Rejected)
                | (Self::InProgress, Self::Expired)
        );
        if allowed {
            Ok(to)
        } else {
            Err(StateTransitionError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl FromStr for GdprRequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(ValidationError::UnknownGdprStatus(other.to_string())),
        }
    }
}

/// Answer deadline for a request received at `received_at`.
pub fn due_date(received_at: DateTime<Utc>) -> DateTime<Utc> {
    received_at + Duration::days(RESPONSE_DEADLINE_DAYS)
}

/// Reference number quoted to the data subject, e.g.
/// `GDPR-1718000000000-K3Z9Q0A1B`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceNumber(String);

impl ReferenceNumber {
    /// Build a reference from the submission time and a source of random
    /// bytes. Bytes at or above [`REFERENCE_BYTE_LIMIT`] are discarded so
    /// every character of `[0-9A-Z]` is equally likely.
    pub fn generate(submitted_at: DateTime<Utc>, mut next_byte: impl FnMut() -> u8) -> Self {
        let mut suffix = String::with_capacity(REFERENCE_SUFFIX_LEN);
        while suffix.len() < REFERENCE_SUFFIX_LEN {
            let b = next_byte();
            if b < REFERENCE_BYTE_LIMIT {
                suffix.push(REFERENCE_ALPHABET[usize::from(b) % REFERENCE_ALPHABET.len()] as char);
            }
        }
        Self(format!("GDPR-{}-{suffix}", submitted_at.timestamp_millis()))
    }

    /// Wrap a reference loaded from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Borrow the reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn happy_path_transitions() {
        let s = GdprRequestStatus::Pending;
        let s = s.transition(GdprRequestStatus::InProgress).unwrap();
        let s = s.transition(GdprRequestStatus::Completed).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn cannot_complete_without_processing() {
        let err = GdprRequestStatus::Pending
            .transition(GdprRequestStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, StateTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [
            GdprRequestStatus::Completed,
            GdprRequestStatus::Rejected,
            GdprRequestStatus::Expired,
        ] {
            let err = terminal.transition(GdprRequestStatus::InProgress).unwrap_err();
            assert!(matches!(err, StateTransitionError::AlreadyTerminal { .. }));
        }
    }

    #[test]
    fn self_transition_is_invalid() {
        assert!(GdprRequestStatus::InProgress
            .transition(GdprRequestStatus::InProgress)
            .is_err());
    }

    #[test]
    fn closing_statuses() {
        assert!(GdprRequestStatus::Completed.closes_request());
        assert!(GdprRequestStatus::Rejected.closes_request());
        assert!(!GdprRequestStatus::Expired.closes_request());
    }

    #[test]
    fn due_date_is_thirty_days_out() {
        let received = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        assert_eq!(due_date(received), Utc.with_ymd_and_hms(2025, 2, 9, 9, 0, 0).unwrap());
    }

    #[test]
    fn reference_number_format() {
        let at = Utc.timestamp_millis_opt(1_718_000_000_123).unwrap();
        let mut bytes = [0u8, 1, 10, 35, 36, 71, 200, 251, 9].into_iter();
        let r = ReferenceNumber::generate(at, || bytes.next().unwrap());
        assert_eq!(r.as_str(), "GDPR-1718000000123-01AZ0ZKZ9");
    }

    #[test]
    fn reference_rejects_biased_bytes() {
        let at = Utc.timestamp_millis_opt(1_718_000_000_000).unwrap();
        let mut bytes = [252u8, 255, 0, 253, 1, 2, 3, 4, 5, 6, 7, 254, 8].into_iter();
        let r = ReferenceNumber::generate(at, || bytes.next().unwrap());
        assert_eq!(r.as_str(), "GDPR-1718000000000-012345678");
        assert_eq!(bytes.next(), None);
    }

    #[test]
    fn reference_characters_are_uniform() {
        // One full cycle of accepted bytes hits each character exactly seven times.
        let at = Utc.timestamp_millis_opt(0).unwrap();
        let mut source = (0u8..=255).cycle();
        let mut counts = [0usize; 36];
        for _ in 0..28 {
            let r = ReferenceNumber::generate(at, || source.next().unwrap());
            for c in r.as_str().rsplit('-').next().unwrap().bytes() {
                let idx = REFERENCE_ALPHABET.iter().position(|a| *a == c).unwrap();
                counts[idx] += 1;
            }
        }
        assert!(counts.iter().all(|n| *n == 7), "{counts:?}");
    }

    #[test]
    fn parse_request_types_and_statuses() {
        assert_eq!("erasure".parse::<GdprRequestType>().unwrap(), GdprRequestType::Erasure);
        assert!("forget_me".parse::<GdprRequestType>().is_err());
        assert_eq!(
            "in_progress".parse::<GdprRequestStatus>().unwrap(),
            GdprRequestStatus::InProgress
        );
        assert!("done".parse::<GdprRequestStatus>().is_err());
    }
}
