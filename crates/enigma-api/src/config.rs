//! # Service Configuration
//!
//! Read once from the environment at process start. There is no hot
//! reload: changing a variable requires a restart.
//!
//! | Variable                   | Default   | Purpose                                      |
//! |----------------------------|-----------|----------------------------------------------|
//! | `PORT`                     | `8080`    | HTTP listen port                             |
//! | `RESTAURANT_ID`            | `enigma`  | Restaurant whose legal content is served     |
//! | `BAAS_URL`                 | unset     | BaaS project URL exposed to the frontend     |
//! | `BAAS_ANON_KEY`            | unset     | Public BaaS key exposed to the frontend      |
//! | `BAAS_SERVICE_ROLE_KEY`    | unset     | Staff bearer secret; unset disables auth     |
//! | `CONSENT_RETENTION_MONTHS` | `24`      | Consent validity, 1 to 24 months             |
//! | `TRUSTED_PROXY_HOPS`       | `0`       | Reverse proxies whose forwarded-for is used  |
//! | `RATE_LIMIT_REQUESTS`      | `1000`    | Requests per client per window               |
//! | `RATE_LIMIT_WINDOW_SECS`   | `60`      | Rate limit window length                     |
//!
//! `DATABASE_URL` is read by [`crate::db::init_pool`].

use enigma_core::{RetentionWindow, ValidationError};
use url::Url;

use crate::middleware::rate_limit::RateLimitConfig;

/// Hosted backend project the frontend talks to directly.
#[derive(Clone)]
pub struct BaasConfig {
    /// Project URL.
    pub project_url: Url,
    /// Public anonymous key. Safe to hand to browsers.
    pub anon_key: Option<String>,
}

/// Application configuration.
///
/// Custom `Debug` redacts `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Restaurant identifier.
    pub restaurant_id: String,
    /// How long a consent decision stays valid.
    pub retention: RetentionWindow,
    /// Hosted backend project, if configured.
    pub baas: Option<BaasConfig>,
    /// Staff bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Reverse proxies in front of the service. `0` means clients connect
    /// directly and forwarded headers are ignored.
    pub trusted_proxies: usize,
    /// Per-client request limits.
    pub rate_limit: RateLimitConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("restaurant_id", &self.restaurant_id)
            .field("retention_months", &self.retention.months())
            .field("baas_url", &self.baas.as_ref().map(|b| b.project_url.as_str()))
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("trusted_proxies", &self.trusted_proxies)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            restaurant_id: "enigma".to_string(),
            retention: RetentionWindow::default(),
            baas: None,
            auth_token: None,
            trusted_proxies: 0,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let retention = match get("CONSENT_RETENTION_MONTHS") {
            Some(raw) => {
                let months: u32 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber("CONSENT_RETENTION_MONTHS", raw))?;
                RetentionWindow::new(months)?
            }
            None => defaults.retention,
        };

        let number = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            get(key)
                .map(|raw| raw.parse().map_err(|_| ConfigError::InvalidNumber(key, raw)))
                .transpose()
        };
        let trusted_proxies = match number("TRUSTED_PROXY_HOPS")? {
            Some(hops) => usize::try_from(hops)
                .map_err(|_| ConfigError::InvalidNumber("TRUSTED_PROXY_HOPS", hops.to_string()))?,
            None => defaults.trusted_proxies,
        };
        let rate_limit = RateLimitConfig {
            max_requests: number("RATE_LIMIT_REQUESTS")?.unwrap_or(defaults.rate_limit.max_requests),
            window_secs: match number("RATE_LIMIT_WINDOW_SECS")? {
                Some(0) => return Err(ConfigError::InvalidNumber("RATE_LIMIT_WINDOW_SECS", "0".into())),
                Some(secs) => secs,
                None => defaults.rate_limit.window_secs,
            },
            ..defaults.rate_limit
        };

        let baas = match get("BAAS_URL") {
            Some(raw) => Some(BaasConfig {
                project_url: Url::parse(&raw)
                    .map_err(|e| ConfigError::InvalidUrl("BAAS_URL", e.to_string()))?,
                anon_key: get("BAAS_ANON_KEY"),
            }),
            None => None,
        };

        Ok(Self {
            port,
            restaurant_id: get("RESTAURANT_ID").unwrap_or(defaults.restaurant_id),
            retention,
            baas,
            auth_token: get("BAAS_SERVICE_ROLE_KEY"),
            trusted_proxies,
            rate_limit,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid number for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error(transparent)]
    Retention(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.restaurant_id, "enigma");
        assert_eq!(cfg.retention.months(), 24);
        assert!(cfg.baas.is_none());
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.trusted_proxies, 0);
        assert_eq!(cfg.rate_limit.max_requests, 1000);
        assert_eq!(cfg.rate_limit.window_secs, 60);
    }

    #[test]
    fn reads_all_variables() {
        let cfg = load(&[
            ("PORT", "3000"),
            ("RESTAURANT_ID", "enigma-cocina"),
            ("BAAS_URL", "https://project.example.co"),
            ("BAAS_ANON_KEY", "anon"),
            ("BAAS_SERVICE_ROLE_KEY", "service-secret"),
            ("CONSENT_RETENTION_MONTHS", "13"),
            ("TRUSTED_PROXY_HOPS", "2"),
            ("RATE_LIMIT_REQUESTS", "50"),
            ("RATE_LIMIT_WINDOW_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(cfg.trusted_proxies, 2);
        assert_eq!(cfg.rate_limit.max_requests, 50);
        assert_eq!(cfg.rate_limit.window_secs, 10);
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.restaurant_id, "enigma-cocina");
        assert_eq!(cfg.retention.months(), 13);
        let baas = cfg.baas.unwrap();
        assert_eq!(baas.project_url.as_str(), "https://project.example.co/");
        assert_eq!(baas.anon_key.as_deref(), Some("anon"));
        assert_eq!(cfg.auth_token.as_deref(), Some("service-secret"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = load(&[("BAAS_SERVICE_ROLE_KEY", "   "), ("PORT", "")]).unwrap();
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn retention_above_legal_maximum_is_rejected() {
        let err = load(&[("CONSENT_RETENTION_MONTHS", "36")]).unwrap_err();
        assert!(matches!(err, ConfigError::Retention(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(load(&[("PORT", "http")]), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(
            load(&[("BAAS_URL", "not a url")]),
            Err(ConfigError::InvalidUrl("BAAS_URL", _))
        ));
        assert!(matches!(
            load(&[("CONSENT_RETENTION_MONTHS", "two")]),
            Err(ConfigError::InvalidNumber(..))
        ));
        assert!(matches!(
            load(&[("TRUSTED_PROXY_HOPS", "-1")]),
            Err(ConfigError::InvalidNumber("TRUSTED_PROXY_HOPS", _))
        ));
        assert!(matches!(
            load(&[("RATE_LIMIT_WINDOW_SECS", "0")]),
            Err(ConfigError::InvalidNumber("RATE_LIMIT_WINDOW_SECS", _))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = AppConfig {
            auth_token: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[REDACTED]"));
    }
}
