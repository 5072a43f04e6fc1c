//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! Public endpoints (legal content, cookie consent, newsletter, GDPR
//! submission) are open to visitors. Staff endpoints (publishing content,
//! consent statistics, GDPR processing, the audit trail) require the
//! service-role secret:
//!
//! ```text
//! Authorization: Bearer {BAAS_SERVICE_ROLE_KEY}
//! ```
//!
//! ## CallerIdentity
//!
//! Every request gets a [`CallerIdentity`] injected into the request
//! extensions. Requests without an `Authorization` header are
//! [`Role::Anonymous`]; a present but invalid header is rejected with 401.
//! Handlers extract the identity via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use enigma_core::ActorType;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Caller roles, ordered by privilege level.
///
/// The `Ord` derivation respects variant declaration order:
/// `Anonymous < Staff`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Website visitor. Can read legal content and manage their own consent.
    Anonymous,
    /// Restaurant staff. Full access.
    Staff,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Staff => "staff",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the caller, available to all route handlers via Axum's
/// `FromRequestParts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self { role: Role::Anonymous }
    }

    pub fn staff() -> Self {
        Self { role: Role::Staff }
    }

    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    /// Actor recorded on audit events caused by this caller.
    pub fn actor_type(&self) -> ActorType {
        match self.role {
            Role::Anonymous => ActorType::Anonymous,
            Role::Staff => ActorType::Staff,
        }
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present (middleware didn't run or failed).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
///
/// Anonymous callers get 401 so clients know to send credentials; an
/// authenticated caller with an insufficient role gets 403.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else if caller.role == Role::Anonymous {
        Err(AppError::Unauthorized(format!(
            "{} credentials required",
            minimum.as_str()
        )))
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ, performs a dummy comparison so the rejection takes
/// the same time as a mismatch.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the caller from the Authorization header and inject a
/// [`CallerIdentity`] into request extensions.
///
/// When `AuthConfig.token` is `None`, every request is treated as staff
/// (auth disabled / development mode).
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    let identity = match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                None => CallerIdentity::anonymous(),
                Some(header_value) => match header_value.strip_prefix("Bearer ") {
                    Some(provided) if constant_time_token_eq(provided.trim(), expected) => {
                        CallerIdentity::staff()
                    }
                    Some(_) => {
                        tracing::warn!("authentication failed: invalid bearer token");
                        return unauthorized_response("invalid bearer token");
                    }
                    None => {
                        tracing::warn!("authentication failed: non-Bearer authorization scheme");
                        return unauthorized_response(
                            "authorization header must use Bearer scheme",
                        );
                    }
                },
            }
        }
        _ => CallerIdentity::staff(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Minimal router echoing the resolved role.
    fn test_app(token: Option<String>) -> Router {
        let auth_config = AuthConfig { token };
        Router::new()
            .route(
                "/test",
                get(|caller: CallerIdentity| async move { caller.role.as_str() }),
            )
            .route(
                "/staff",
                get(|caller: CallerIdentity| async move {
                    require_role(&caller, Role::Staff).map(|_| "ok")
                }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_bearer_token_is_staff() {
        let (status, body) = call(test_app(Some("my-secret".into())), "/test", Some("Bearer my-secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "staff");
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let (status, body) = call(test_app(Some("my-secret".into())), "/test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn invalid_token_rejected() {
        let (status, body) =
            call(test_app(Some("my-secret".into())), "/test", Some("Bearer wrong-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(err["error"]["code"], "UNAUTHORIZED");
        assert!(err["error"]["message"].as_str().unwrap().contains("invalid"));
    }

    #[tokio::test]
    async fn non_bearer_scheme_rejected() {
        let (status, body) =
            call(test_app(Some("my-secret".into())), "/test", Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer scheme"));
    }

    #[tokio::test]
    async fn anonymous_caller_cannot_reach_staff_route() {
        let (status, body) = call(test_app(Some("my-secret".into())), "/staff", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("credentials required"));

        let (status, _) =
            call(test_app(Some("my-secret".into())), "/staff", Some("Bearer my-secret")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_disabled_treats_everyone_as_staff() {
        let (status, body) = call(test_app(None), "/staff", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        let (_, body) = call(test_app(None), "/test", Some("Bearer anything")).await;
        assert_eq!(body, "staff");
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_token_eq("secret-token-123", "secret-token-123"));
        assert!(!constant_time_token_eq("wrong-token", "secret-token-123"));
        assert!(!constant_time_token_eq("secret", "secret-token-123"));
        assert!(!constant_time_token_eq("", "secret-token-123"));
    }

    #[test]
    fn role_ordering_and_names() {
        assert!(Role::Anonymous < Role::Staff);
        assert_eq!(Role::Anonymous.as_str(), "anonymous");
        assert_eq!(Role::Staff.as_str(), "staff");
    }

    #[test]
    fn caller_actor_types() {
        assert_eq!(CallerIdentity::anonymous().actor_type(), ActorType::Anonymous);
        assert_eq!(CallerIdentity::staff().actor_type(), ActorType::Staff);
    }

    #[test]
    fn require_role_distinguishes_anonymous() {
        assert!(require_role(&CallerIdentity::staff(), Role::Staff).is_ok());
        assert!(matches!(
            require_role(&CallerIdentity::anonymous(), Role::Staff),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn auth_config_debug_redacts() {
        let out = format!("{:?}", AuthConfig { token: Some("hunter2".into()) });
        assert!(!out.contains("hunter2"));
    }
}
