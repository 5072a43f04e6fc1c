//! # Public Configuration
//!
//! **GET `/api/config/public`** — Values the frontend needs at boot. Only
//! public values are exposed; the service-role key never leaves the server.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use enigma_core::{CookieCategory, Locale};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::legal_content;
use crate::state::AppState;

/// Frontend boot configuration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicConfig {
    pub restaurant_id: String,
    /// BaaS project URL, when configured.
    pub baas_url: Option<String>,
    /// Public anonymous BaaS key, when configured.
    pub baas_anon_key: Option<String>,
    pub consent_retention_months: u32,
    /// Privacy policy version consents are currently stamped with.
    pub current_policy_version: String,
    pub locales: Vec<String>,
    pub cookie_categories: Vec<String>,
}

/// Build the public configuration router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/config/public", get(public_config))
}

/// GET /api/config/public — Public configuration.
#[utoipa::path(
    get,
    path = "/api/config/public",
    responses((status = 200, description = "Public configuration", body = PublicConfig)),
    tag = "config"
)]
pub(crate) async fn public_config(State(state): State<AppState>) -> Json<PublicConfig> {
    let config = &state.config;
    Json(PublicConfig {
        restaurant_id: config.restaurant_id.clone(),
        baas_url: config.baas.as_ref().map(|b| b.project_url.to_string()),
        baas_anon_key: config.baas.as_ref().and_then(|b| b.anon_key.clone()),
        consent_retention_months: config.retention.months(),
        current_policy_version: legal_content::current_policy_version(&state, Utc::now()),
        locales: Locale::ALL.iter().map(|l| l.as_str().to_string()).collect(),
        cookie_categories: CookieCategory::ALL
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, BaasConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn fetch(state: AppState) -> PublicConfig {
        let app = router().with_state(state);
        let resp = app
            .oneshot(Request::builder().uri("/api/config/public").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn defaults_without_baas() {
        let config = fetch(AppState::new()).await;
        assert_eq!(config.restaurant_id, "enigma");
        assert!(config.baas_url.is_none());
        assert_eq!(config.consent_retention_months, 24);
        assert_eq!(config.current_policy_version, "v1.0");
        assert_eq!(config.locales, vec!["es", "en"]);
        assert_eq!(config.cookie_categories.len(), 5);
    }

    #[tokio::test]
    async fn exposes_public_keys_only() {
        let app_config = AppConfig {
            baas: Some(BaasConfig {
                project_url: "https://project.example.co".parse().unwrap(),
                anon_key: Some("public-anon".into()),
            }),
            auth_token: Some("service-role-secret".into()),
            ..AppConfig::default()
        };
        let config = fetch(AppState::with_config(app_config, None)).await;
        assert_eq!(config.baas_url.as_deref(), Some("https://project.example.co/"));
        assert_eq!(config.baas_anon_key.as_deref(), Some("public-anon"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("service-role-secret"));
    }
}
