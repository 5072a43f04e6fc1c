//! # API Route Modules
//!
//! - `legal_content` — versioned legal documents: current, history, publish.
//! - `cookies` — cookie consent trail, banner decision, statistics.
//! - `newsletter` — customer identification and newsletter subscriptions.
//! - `gdpr` — data subject rights requests and their processing.
//! - `audit` — hash-chained audit trail and its verification.
//! - `public_config` — configuration the frontend needs at boot.
//! - `auth_disabled` — legacy auth endpoints, permanently 404.
//! - `pages` — server-rendered legal pages.

pub mod audit;
pub mod auth_disabled;
pub mod cookies;
pub mod gdpr;
pub mod legal_content;
pub mod newsletter;
pub mod pages;
pub mod public_config;

use enigma_core::{LegalDocumentType, Locale};

use crate::error::AppError;

/// Resolve the locale a read asked for. Absent means the default locale;
/// an unknown one is a 404 rather than a fallback.
pub(crate) fn requested_locale(raw: Option<&str>) -> Result<Locale, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Locale::DEFAULT),
        Some(code) => code
            .parse()
            .map_err(|_| AppError::NotFound(format!("no legal content for locale '{code}'"))),
    }
}

/// Resolve the document type a read asked for. Unknown types are a 404.
pub(crate) fn requested_type(raw: &str) -> Result<LegalDocumentType, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("unknown legal document type '{}'", raw.trim())))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_locale_uses_default() {
        assert_eq!(requested_locale(None).unwrap(), Locale::DEFAULT);
        assert_eq!(requested_locale(Some("  ")).unwrap(), Locale::DEFAULT);
        assert_eq!(requested_locale(Some("EN")).unwrap(), Locale::En);
    }

    #[test]
    fn unknown_locale_and_type_are_not_found() {
        assert!(matches!(requested_locale(Some("fr")), Err(AppError::NotFound(_))));
        assert!(matches!(requested_type("menu"), Err(AppError::NotFound(_))));
        assert_eq!(requested_type("privacy").unwrap(), LegalDocumentType::PrivacyPolicy);
    }
}
