//! # Customer Identifiers
//!
//! Customers are identified by email address. Addresses are normalized
//! (trimmed, lowercased) at construction so that lookups are insensitive to
//! how the visitor typed them, which is what makes identification
//! idempotent.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_EMAIL_LEN: usize = 254;

/// A normalized email address.
///
/// # Validation
///
/// - At most 254 characters after trimming
/// - Exactly one `@` with a non-empty local part
/// - A domain with at least one `.` and no empty labels
/// - No whitespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalize an email address.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let normalized = raw.trim().to_lowercase();
        if !Self::is_well_formed(&normalized) {
            return Err(ValidationError::InvalidEmail(raw));
        }
        Ok(Self(normalized))
    }

    fn is_well_formed(s: &str) -> bool {
        if s.is_empty() || s.len() > MAX_EMAIL_LEN || s.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = s.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.contains('@') || !domain.contains('.') {
            return false;
        }
        domain.split('.').all(|label| !label.is_empty())
    }

    /// Borrow the normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part, e.g. `example.com`.
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an identification request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationMethod {
    /// An existing customer has this email.
    EmailMatch,
    /// No customer had this email; one was created.
    NewCustomer,
}

impl IdentificationMethod {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailMatch => "email_match",
            Self::NewCustomer => "new_customer",
        }
    }
}
