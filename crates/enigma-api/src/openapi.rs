//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`. The HTML legal pages are not part of it.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the JSON API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Enigma Legal & Consent API",
        version = "0.1.0",
        description = "Legal content, cookie consent, customer identification, newsletter and GDPR rights requests for the Enigma restaurant website."
    ),
    paths(
        // Legal content
        crate::routes::legal_content::get_content,
        crate::routes::legal_content::get_history,
        crate::routes::legal_content::get_by_id,
        crate::routes::legal_content::publish_content,
        // Cookies
        crate::routes::cookies::record_consent,
        crate::routes::cookies::get_status,
        crate::routes::cookies::withdraw_consent,
        crate::routes::cookies::get_consent_history,
        crate::routes::cookies::get_stats,
        // Newsletter
        crate::routes::newsletter::identify,
        crate::routes::newsletter::subscribe,
        crate::routes::newsletter::subscription_status,
        crate::routes::newsletter::unsubscribe,
        // GDPR
        crate::routes::gdpr::submit_request,
        crate::routes::gdpr::list_requests,
        crate::routes::gdpr::get_request,
        crate::routes::gdpr::update_request,
        // Audit
        crate::routes::audit::list_events,
        crate::routes::audit::verify_chain,
        // Config
        crate::routes::public_config::public_config,
    ),
    components(schemas(
        // State record types
        crate::state::LegalDocumentRecord,
        crate::state::CookieConsentRecord,
        crate::state::CustomerRecord,
        crate::state::CustomerIdentity,
        crate::state::NewsletterSubscriptionRecord,
        crate::state::GdprRequestRecord,
        crate::state::AuditRecord,
        // Service views
        crate::services::legal_content::LegalDocumentView,
        crate::services::cookie_consent::ConsentStatus,
        crate::services::cookie_consent::ConsentStatisticsReport,
        crate::services::identification::Identification,
        crate::services::newsletter::SubscribeOutcome,
        crate::services::newsletter::SubscriptionStatus,
        crate::services::gdpr::GdprRequestPage,
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::error::FieldError,
        // Legal content DTOs
        crate::routes::legal_content::LegalDocumentList,
        crate::routes::legal_content::LegalDocumentHistory,
        crate::routes::legal_content::PublishDocumentRequest,
        // Cookie DTOs
        crate::routes::cookies::RecordConsentRequest,
        crate::routes::cookies::WithdrawConsentRequest,
        crate::routes::cookies::ConsentHistory,
        // Newsletter DTOs
        crate::routes::newsletter::IdentifyRequest,
        crate::routes::newsletter::SubscribeRequest,
        // GDPR DTOs
        crate::routes::gdpr::SubmitGdprRequest,
        crate::routes::gdpr::UpdateGdprStatusRequest,
        // Audit DTOs
        crate::routes::audit::AuditTrail,
        crate::routes::audit::ChainVerificationResponse,
        // Config
        crate::routes::public_config::PublicConfig,
    )),
    tags(
        (name = "legal_content", description = "Versioned legal documents"),
        (name = "cookies", description = "Cookie consent trail"),
        (name = "newsletter", description = "Customer identification and newsletter"),
        (name = "gdpr", description = "Data subject rights requests"),
        (name = "audit", description = "Hash-chained audit trail"),
        (name = "config", description = "Public frontend configuration"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_json_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in [
            "/api/legal/content",
            "/api/legal/content/history",
            "/api/legal/content/{id}",
            "/api/legal/cookies",
            "/api/legal/cookies/withdraw",
            "/api/legal/cookies/history",
            "/api/legal/cookies/stats",
            "/api/newsletter/identify",
            "/api/newsletter/subscribe",
            "/api/legal/gdpr",
            "/api/legal/gdpr/{id}",
            "/api/legal/audit",
            "/api/legal/audit/verify",
            "/api/config/public",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }

    #[test]
    fn spec_serializes() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Enigma Legal & Consent API");
        assert!(json["components"]["schemas"]["GdprRequestRecord"].is_object());
    }
}
