//! # Cookie Consent
//!
//! Preferences a visitor grants per cookie category, how the decision was
//! captured, the retention window after which a decision expires, and the
//! rules that decide whether the consent banner must be shown again.
//!
//! Consent history is append-only: a withdrawal or a changed decision is a
//! new entry, and the visitor's current decision is always the latest one.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest period a consent decision stays valid.
pub const MAX_RETENTION_MONTHS: u32 = 24;

const MAX_VISITOR_ID_LEN: usize = 128;

// -- Categories & preferences -------------------------------------------------

/// Cookie category a visitor can accept or refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieCategory {
    /// Strictly necessary cookies. Always allowed.
    Necessary,
    /// Usage measurement.
    Analytics,
    /// Advertising and remarketing.
    Marketing,
    /// Remembered settings such as language.
    Functionality,
    /// Fraud prevention and session protection.
    Security,
}

impl CookieCategory {
    /// Every category, necessary first.
    pub const ALL: [CookieCategory; 5] = [
        Self::Necessary,
        Self::Analytics,
        Self::Marketing,
        Self::Functionality,
        Self::Security,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Necessary => "necessary",
            Self::Analytics => "analytics",
            Self::Marketing => "marketing",
            Self::Functionality => "functionality",
            Self::Security => "security",
        }
    }
}

impl FromStr for CookieCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownCookieCategory(s.to_string()))
    }
}

/// Per-category consent decision.
///
/// `necessary` is accepted on input for compatibility with banner payloads
/// but [`normalized`](Self::normalized) always forces it to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPreferences {
    /// Strictly necessary cookies.
    #[serde(default = "always_true")]
    pub necessary: bool,
    /// Analytics cookies.
    #[serde(default)]
    pub analytics: bool,
    /// Marketing cookies.
    #[serde(default)]
    pub marketing: bool,
    /// Functionality cookies.
    #[serde(default)]
    pub functionality: bool,
    /// Security cookies.
    #[serde(default)]
    pub security: bool,
}

fn always_true() -> bool {
    true
}

impl ConsentPreferences {
    /// Only necessary cookies. This is the state recorded on withdrawal.
    pub fn necessary_only() -> Self {
        Self {
            necessary: true,
            analytics: false,
            marketing: false,
            functionality: false,
            security: false,
        }
    }

    /// Every category accepted.
    pub fn accept_all() -> Self {
        Self {
            necessary: true,
            analytics: true,
            marketing: true,
            functionality: true,
            security: true,
        }
    }

    /// The same preferences with `necessary` forced on.
    pub fn normalized(self) -> Self {
        Self {
            necessary: true,
            ..self
        }
    }

    /// Whether `category` is allowed by these preferences.
    pub fn allows(&self, category: CookieCategory) -> bool {
        match category {
            CookieCategory::Necessary => true,
            CookieCategory::Analytics => self.analytics,
            CookieCategory::Marketing => self.marketing,
            CookieCategory::Functionality => self.functionality,
            CookieCategory::Security => self.security,
        }
    }
}

impl Default for ConsentPreferences {
    fn default() -> Self {
        Self::necessary_only()
    }
}

/// How a consent decision was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMethod {
    /// Explicit choice in the cookie banner.
    Banner,
    /// Submitted programmatically (preferences page, mobile app).
    Api,
    /// Inferred from continued browsing where the law permits it.
    Implicit,
}

impl ConsentMethod {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Api => "api",
            Self::Implicit => "implicit",
        }
    }
}

impl FromStr for ConsentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "banner" => Ok(Self::Banner),
            "api" => Ok(Self::Api),
            "implicit" => Ok(Self::Implicit),
            other => Err(ValidationError::UnknownConsentMethod(other.to_string())),
        }
    }
}

/// Whether a consent entry grants or withdraws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentAction {
    /// Preferences were given or changed.
    Granted,
    /// All optional categories were withdrawn.
    Withdrawn,
}

impl ConsentAction {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for ConsentAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(Self::Granted),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(ValidationError::UnknownAuditKind {
                kind: "consent action",
                value: other.to_string(),
            }),
        }
    }
}

// -- Visitor identity ---------------------------------------------------------

/// Opaque browser-scoped identifier issued by the consent banner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VisitorId(String);

impl VisitorId {
    /// Validate and wrap a visitor identifier. Surrounding whitespace is
    /// trimmed; the remainder must be 1-128 printable ASCII characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > MAX_VISITOR_ID_LEN
            || !trimmed.chars().all(|c| c.is_ascii_graphic())
        {
            return Err(ValidationError::InvalidVisitorId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VisitorId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VisitorId> for String {
    fn from(id: VisitorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Retention ----------------------------------------------------------------

/// How long a consent decision remains valid, in calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionWindow {
    months: u32,
}

impl RetentionWindow {
    /// Create a window of `months`, which must be within
    /// `1..=MAX_RETENTION_MONTHS`.
    pub fn new(months: u32) -> Result<Self, ValidationError> {
        if months == 0 || months > MAX_RETENTION_MONTHS {
            return Err(ValidationError::RetentionOutOfRange {
                months,
                max: MAX_RETENTION_MONTHS,
            });
        }
        Ok(Self { months })
    }

    /// Window length in months.
    pub fn months(&self) -> u32 {
        self.months
    }

    /// Expiry of a decision granted at `granted_at`. Calendar arithmetic:
    /// a grant on 31 January expires on the last day of the target month.
    pub fn expiry_for(&self, granted_at: DateTime<Utc>) -> DateTime<Utc> {
        granted_at
            .checked_add_months(Months::new(self.months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self {
            months: MAX_RETENTION_MONTHS,
        }
    }
}

// -- Banner decision ----------------------------------------------------------

/// Outcome of checking a visitor's latest consent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerDecision {
    /// Valid consent on file; the banner stays hidden.
    Valid,
    /// The visitor has never decided.
    NoConsent,
    /// The latest entry is a withdrawal.
    Withdrawn,
    /// The latest decision is past its expiry.
    Expired,
    /// The decision was made under an older privacy policy.
    PolicyChanged,
}

impl BannerDecision {
    /// Evaluate the latest entry for a visitor.
    pub fn evaluate(
        latest: Option<&ConsentEntry<'_>>,
        current_policy_version: &str,
        now: DateTime<Utc>,
    ) -> Self {
        match latest {
            None => Self::NoConsent,
            Some(e) if e.action == ConsentAction::Withdrawn => Self::Withdrawn,
            Some(e) if e.expires_at <= now => Self::Expired,
            Some(e) if e.policy_version != current_policy_version => Self::PolicyChanged,
            Some(_) => Self::Valid,
        }
    }

    /// Whether the banner must be shown.
    pub fn shows_banner(&self) -> bool {
        !matches!(self, Self::Valid)
    }
}

// -- Statistics ---------------------------------------------------------------

/// Borrowed view of one stored consent entry.
#[derive(Debug, Clone, Copy)]
pub struct ConsentEntry<'a> {
    /// Visitor the entry belongs to.
    pub visitor_id: &'a str,
    /// Append order across all visitors.
    pub sequence: u64,
    /// Grant or withdrawal.
    pub action: ConsentAction,
    /// Capture method.
    pub method: ConsentMethod,
    /// Decision per category.
    pub preferences: ConsentPreferences,
    /// Policy version in force when the decision was made.
    pub policy_version: &'a str,
    /// When the entry was made.
    pub granted_at: DateTime<Utc>,
    /// When the decision lapses.
    pub expires_at: DateTime<Utc>,
}

/// Aggregate view over consent entries within a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentStatistics {
    /// Entries made in the period.
    pub total_records: usize,
    /// Distinct visitors with an entry in the period.
    pub visitors: usize,
    /// Visitors whose latest entry is a grant that has not expired.
    pub active: usize,
    /// Visitors whose latest entry is a withdrawal.
    pub withdrawn: usize,
    /// Visitors whose latest grant has lapsed.
    pub expired: usize,
    /// Entries per capture method.
    pub by_method: BTreeMap<String, usize>,
    /// Share of active visitors accepting each category, in percent.
    pub acceptance_rates: BTreeMap<String, f64>,
}

impl ConsentStatistics {
    /// Aggregate `entries` made at or after `since`, evaluated at `now`.
    pub fn compute<'a>(
        entries: impl IntoIterator<Item = ConsentEntry<'a>>,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut total_records = 0;
        let mut by_method: BTreeMap<String, usize> = BTreeMap::new();
        let mut latest: HashMap<&'a str, ConsentEntry<'a>> = HashMap::new();

        for entry in entries.into_iter().filter(|e| e.granted_at >= since) {
            total_records += 1;
            *by_method.entry(entry.method.as_str().to_string()).or_default() += 1;
            let replace = latest
                .get(entry.visitor_id)
                .map_or(true, |seen| seen.sequence < entry.sequence);
            if replace {
                latest.insert(entry.visitor_id, entry);
            }
        }

        let (mut active, mut withdrawn, mut expired) = (0, 0, 0);
        let mut accepted: BTreeMap<CookieCategory, usize> = BTreeMap::new();
        for entry in latest.values() {
            match entry.action {
                ConsentAction::Withdrawn => withdrawn += 1,
                ConsentAction::Granted if entry.expires_at <= now => expired += 1,
                ConsentAction::Granted => {
                    active += 1;
                    for category in CookieCategory::ALL {
                        if entry.preferences.allows(category) {
                            *accepted.entry(category).or_default() += 1;
                        }
                    }
                }
            }
        }

        let acceptance_rates = CookieCategory::ALL
            .into_iter()
            .map(|category| {
                let count = accepted.get(&category).copied().unwrap_or(0);
                let rate = if active == 0 {
                    0.0
                } else {
                    (count as f64 / active as f64 * 10_000.0).round() / 100.0
                };
                (category.as_str().to_string(), rate)
            })
            .collect();

        Self {
            total_records,
            visitors: latest.len(),
            active,
            withdrawn,
            expired,
            by_method,
            acceptance_rates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, TimeZone};
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn entry<'a>(visitor: &'a str, seq: u64, action: ConsentAction, granted_at: DateTime<Utc>) -> ConsentEntry<'a> {
        ConsentEntry {
            visitor_id: visitor,
            sequence: seq,
            action,
            method: ConsentMethod::Banner,
            preferences: ConsentPreferences {
                analytics: true,
                ..ConsentPreferences::necessary_only()
            },
            policy_version: "v1.0",
            granted_at,
            expires_at: RetentionWindow::default().expiry_for(granted_at),
        }
    }

    #[test]
    fn necessary_is_forced_on() {
        let prefs: ConsentPreferences =
            serde_json::from_str(r#"{"necessary": false, "analytics": true, "marketing": false}"#).unwrap();
        let prefs = prefs.normalized();
        assert!(prefs.necessary);
        assert!(prefs.allows(CookieCategory::Necessary));
        assert!(prefs.allows(CookieCategory::Analytics));
        assert!(!prefs.allows(CookieCategory::Marketing));
    }

    #[test]
    fn missing_categories_default_to_refused() {
        let prefs: ConsentPreferences = serde_json::from_str(r#"{"analytics": true}"#).unwrap();
        assert!(prefs.necessary);
        assert!(!prefs.functionality);
        assert!(!prefs.security);
    }

    #[test]
    fn retention_rejects_out_of_range() {
        assert!(RetentionWindow::new(0).is_err());
        assert!(RetentionWindow::new(25).is_err());
        assert_eq!(RetentionWindow::new(12).unwrap().months(), 12);
        assert_eq!(RetentionWindow::default().months(), MAX_RETENTION_MONTHS);
    }

    #[test]
    fn expiry_is_calendar_months_later() {
        let granted = at(2024, 3, 15);
        let expiry = RetentionWindow::default().expiry_for(granted);
        assert_eq!(expiry, at(2026, 3, 15));
    }

    #[test]
    fn expiry_clamps_to_month_end() {
        let granted = at(2024, 1, 31);
        let expiry = RetentionWindow::new(1).unwrap().expiry_for(granted);
        assert_eq!(expiry.day(), 29);
        assert_eq!(expiry.month(), 2);
    }

    #[test]
    fn visitor_id_validation() {
        assert_eq!(VisitorId::new("  abc-123 ").unwrap().as_str(), "abc-123");
        assert!(VisitorId::new("").is_err());
        assert!(VisitorId::new("has space").is_err());
        assert!(VisitorId::new("x".repeat(129)).is_err());
        let parsed: Result<VisitorId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn method_parsing() {
        assert_eq!("banner".parse::<ConsentMethod>().unwrap(), ConsentMethod::Banner);
        assert!("popup".parse::<ConsentMethod>().is_err());
    }

    #[test]
    fn banner_decision_rules() {
        let now = at(2025, 6, 1);
        let granted = entry("v1", 1, ConsentAction::Granted, at(2025, 1, 1));
        assert_eq!(BannerDecision::evaluate(None, "v1.0", now), BannerDecision::NoConsent);
        assert_eq!(BannerDecision::evaluate(Some(&granted), "v1.0", now), BannerDecision::Valid);
        assert_eq!(
            BannerDecision::evaluate(Some(&granted), "v2.0", now),
            BannerDecision::PolicyChanged
        );
        assert_eq!(
            BannerDecision::evaluate(Some(&granted), "v1.0", at(2027, 2, 1)),
            BannerDecision::Expired
        );
        let withdrawn = entry("v1", 2, ConsentAction::Withdrawn, at(2025, 2, 1));
        assert_eq!(
            BannerDecision::evaluate(Some(&withdrawn), "v1.0", now),
            BannerDecision::Withdrawn
        );
        assert!(BannerDecision::Withdrawn.shows_banner());
        assert!(!BannerDecision::Valid.shows_banner());
    }

    #[test]
    fn statistics_use_latest_entry_per_visitor() {
        let now = at(2025, 6, 1);
        let entries = vec![
            entry("a", 1, ConsentAction::Granted, at(2025, 5, 1)),
            entry("a", 2, ConsentAction::Withdrawn, at(2025, 5, 2)),
            entry("b", 3, ConsentAction::Granted, at(2025, 5, 3)),
            entry("c", 4, ConsentAction::Granted, at(2020, 1, 1)),
        ];
        let stats = ConsentStatistics::compute(entries, now - Duration::days(30), now);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.visitors, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.withdrawn, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.by_method.get("banner"), Some(&3));
        assert_eq!(stats.acceptance_rates.get("analytics"), Some(&100.0));
        assert_eq!(stats.acceptance_rates.get("marketing"), Some(&0.0));
    }

    #[test]
    fn statistics_count_expired_grants() {
        let now = at(2027, 6, 1);
        let entries = vec![entry("a", 1, ConsentAction::Granted, at(2025, 5, 1))];
        let stats = ConsentStatistics::compute(entries, at(2025, 1, 1), now);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.acceptance_rates.get("necessary"), Some(&0.0));
    }

    proptest! {
        #[test]
        fn expiry_is_exactly_retention_months_after_grant(
            months in 1u32..=MAX_RETENTION_MONTHS,
            secs in 0i64..2_000_000_000,
        ) {
            let granted = Utc.timestamp_opt(secs, 0).unwrap();
            let window = RetentionWindow::new(months).unwrap();
            let expiry = window.expiry_for(granted);
            prop_assert_eq!(expiry, granted.checked_add_months(Months::new(months)).unwrap());
            prop_assert!(expiry > granted);
            prop_assert_eq!(expiry.time(), granted.time());
        }
    }
}
