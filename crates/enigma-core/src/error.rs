//! # Error Types
//!
//! Structured errors for domain primitives, built with `thiserror`.
//! Each variant carries the rejected input so that API responses can
//! point the caller at the offending value.

use thiserror::Error;

/// Validation errors for domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Document type is not one of the published legal document kinds.
    #[error("unknown legal document type: \"{0}\"")]
    UnknownDocumentType(String),

    /// Locale is not one of the served languages.
    #[error("unknown locale: \"{0}\" (expected es or en)")]
    UnknownLocale(String),

    /// Consent method is not banner, api or implicit.
    #[error("unknown consent method: \"{0}\" (expected banner, api or implicit)")]
    UnknownConsentMethod(String),

    /// Cookie category name is not recognized.
    #[error("unknown cookie category: \"{0}\"")]
    UnknownCookieCategory(String),

    /// Email address fails the basic shape check.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// Visitor identifier is empty, too long, or contains whitespace.
    #[error("invalid visitor id: \"{0}\" (expected 1-128 printable characters)")]
    InvalidVisitorId(String),

    /// Retention window outside the permitted range.
    #[error("retention window of {months} months is outside 1..={max}")]
    RetentionOutOfRange {
        /// The rejected number of months.
        months: u32,
        /// The legal maximum.
        max: u32,
    },

    /// GDPR request type is not recognized.
    #[error("unknown GDPR request type: \"{0}\"")]
    UnknownGdprRequestType(String),

    /// GDPR request status is not recognized.
    #[error("unknown GDPR request status: \"{0}\"")]
    UnknownGdprStatus(String),

    /// Audit event or actor type is not recognized.
    #[error("unknown audit {kind}: \"{value}\"")]
    UnknownAuditKind {
        /// Which vocabulary was being parsed.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Errors raised when a lifecycle transition is not permitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateTransitionError {
    /// The attempted transition is not valid from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current state name.
        from: String,
        /// The attempted target state name.
        to: String,
    },

    /// The record already reached a terminal state.
    #[error("request is already {state}")]
    AlreadyTerminal {
        /// The terminal state name.
        state: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_error_mentions_bounds() {
        let err = ValidationError::RetentionOutOfRange { months: 36, max: 24 };
        let msg = err.to_string();
        assert!(msg.contains("36"));
        assert!(msg.contains("24"));
    }

    #[test]
    fn transition_error_display() {
        let err = StateTransitionError::InvalidTransition {
            from: "pending".into(),
            to: "completed".into(),
        };
        assert_eq!(err.to_string(), "invalid transition from pending to completed");
    }

    #[test]
    fn audit_kind_error_display() {
        let err = ValidationError::UnknownAuditKind {
            kind: "actor type",
            value: "robot".into(),
        };
        assert!(err.to_string().contains("actor type"));
        assert!(err.to_string().contains("robot"));
    }
}
