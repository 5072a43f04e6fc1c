//! # Legal Document Vocabulary
//!
//! The five legal document kinds the restaurant publishes, the two locales
//! they are served in, and the public page route for each combination.
//!
//! Parsing is strict: an unrecognized type or locale is an error, never a
//! silent fallback to a default. Callers that serve documents must turn
//! that error into "not found".

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Policy version stamped on consents when no privacy policy is published.
pub const DEFAULT_POLICY_VERSION: &str = "v1.0";

/// Kind of legal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalDocumentType {
    /// Company identification and contact details (aviso legal).
    #[serde(alias = "notice")]
    LegalNotice,
    /// How personal data is processed.
    #[serde(alias = "privacy")]
    PrivacyPolicy,
    /// Terms and conditions of use and sale.
    #[serde(alias = "terms")]
    TermsConditions,
    /// Which cookies are set and why.
    #[serde(alias = "cookies")]
    CookiePolicy,
    /// How to exercise data subject rights.
    #[serde(alias = "gdpr")]
    GdprRights,
}

impl LegalDocumentType {
    /// Every document type, in navigation order.
    pub const ALL: [LegalDocumentType; 5] = [
        Self::LegalNotice,
        Self::PrivacyPolicy,
        Self::TermsConditions,
        Self::CookiePolicy,
        Self::GdprRights,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegalNotice => "legal_notice",
            Self::PrivacyPolicy => "privacy_policy",
            Self::TermsConditions => "terms_conditions",
            Self::CookiePolicy => "cookie_policy",
            Self::GdprRights => "gdpr_rights",
        }
    }

    /// URL slug of the public page for this type in `locale`.
    pub fn slug(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Es, Self::LegalNotice) => "aviso-legal",
            (Locale::Es, Self::PrivacyPolicy) => "politica-privacidad",
            (Locale::Es, Self::TermsConditions) => "terminos-condiciones",
            (Locale::Es, Self::CookiePolicy) => "politica-cookies",
            (Locale::Es, Self::GdprRights) => "derechos-gdpr",
            (Locale::En, Self::LegalNotice) => "legal-notice",
            (Locale::En, Self::PrivacyPolicy) => "privacy-policy",
            (Locale::En, Self::TermsConditions) => "terms-conditions",
            (Locale::En, Self::CookiePolicy) => "cookie-policy",
            (Locale::En, Self::GdprRights) => "gdpr-rights",
        }
    }

    /// Reverse lookup of [`slug`](Self::slug).
    pub fn from_slug(locale: Locale, slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.slug(locale) == slug)
    }

    /// Public page path, e.g. `/legal/politica-privacidad` or
    /// `/en/legal/privacy-policy`.
    pub fn page_path(&self, locale: Locale) -> String {
        format!("{}/{}", locale.legal_prefix(), self.slug(locale))
    }
}

impl std::fmt::Display for LegalDocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegalDocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "legal_notice" | "notice" => Ok(Self::LegalNotice),
            "privacy_policy" | "privacy" => Ok(Self::PrivacyPolicy),
            "terms_conditions" | "terms" => Ok(Self::TermsConditions),
            "cookie_policy" | "cookies" => Ok(Self::CookiePolicy),
            "gdpr_rights" | "gdpr" => Ok(Self::GdprRights),
            other => Err(ValidationError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// Language a document is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Spanish, the restaurant's primary language.
    Es,
    /// English.
    En,
}

impl Locale {
    /// Locale used when a caller does not ask for one.
    pub const DEFAULT: Locale = Locale::Es;

    /// Every served locale.
    pub const ALL: [Locale; 2] = [Locale::Es, Locale::En];

    /// ISO 639-1 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::En => "en",
        }
    }

    /// Path prefix under which this locale's legal pages live.
    pub fn legal_prefix(&self) -> &'static str {
        match self {
            Self::Es => "/legal",
            Self::En => "/en/legal",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Self::Es),
            "en" => Ok(Self::En),
            _ => Err(ValidationError::UnknownLocale(s.to_string())),
        }
    }
}

/// Label stamped on consent records for a privacy policy version.
pub fn policy_version_label(version: u32) -> String {
    format!("v{version}.0")
}

/// Normalize a document body before storage: CRLF line endings become LF,
/// trailing whitespace is stripped from every line, and leading/trailing
/// blank lines are removed.
pub fn normalize_body(body: &str) -> String {
    body.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_accepts_short_aliases() {
        assert_eq!("notice".parse::<LegalDocumentType>().unwrap(), LegalDocumentType::LegalNotice);
        assert_eq!("privacy".parse::<LegalDocumentType>().unwrap(), LegalDocumentType::PrivacyPolicy);
        assert_eq!("terms".parse::<LegalDocumentType>().unwrap(), LegalDocumentType::TermsConditions);
        assert_eq!("cookies".parse::<LegalDocumentType>().unwrap(), LegalDocumentType::CookiePolicy);
        assert_eq!("gdpr".parse::<LegalDocumentType>().unwrap(), LegalDocumentType::GdprRights);
    }

    #[test]
    fn document_type_roundtrips_canonical_name() {
        for t in LegalDocumentType::ALL {
            assert_eq!(t.as_str().parse::<LegalDocumentType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn serde_accepts_alias() {
        let t: LegalDocumentType = serde_json::from_str("\"cookies\"").unwrap();
        assert_eq!(t, LegalDocumentType::CookiePolicy);
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        let err = "refund_policy".parse::<LegalDocumentType>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownDocumentType("refund_policy".into()));
    }

    #[test]
    fn unknown_locale_is_rejected_not_defaulted() {
        assert!("fr".parse::<Locale>().is_err());
        assert!("".parse::<Locale>().is_err());
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
    }

    #[test]
    fn page_paths_follow_locale_prefix() {
        assert_eq!(
            LegalDocumentType::PrivacyPolicy.page_path(Locale::Es),
            "/legal/politica-privacidad"
        );
        assert_eq!(
            LegalDocumentType::CookiePolicy.page_path(Locale::En),
            "/en/legal/cookie-policy"
        );
    }

    #[test]
    fn slugs_are_reversible() {
        for locale in Locale::ALL {
            for t in LegalDocumentType::ALL {
                assert_eq!(LegalDocumentType::from_slug(locale, t.slug(locale)), Some(t));
            }
        }
        assert_eq!(LegalDocumentType::from_slug(Locale::En, "aviso-legal"), None);
    }

    #[test]
    fn policy_label_format() {
        assert_eq!(policy_version_label(1), DEFAULT_POLICY_VERSION);
        assert_eq!(policy_version_label(3), "v3.0");
    }

    #[test]
    fn normalize_body_strips_crlf_and_trailing_space() {
        let body = "\r\n# Title  \r\nLine one \t\r\n\r\nLine two\r\n\r\n";
        assert_eq!(normalize_body(body), "# Title\nLine one\n\nLine two");
    }
}
