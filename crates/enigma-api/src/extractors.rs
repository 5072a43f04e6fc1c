//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, helpers to extract and
//! validate JSON bodies and query strings in handlers, and the
//! [`ClientContext`] extractor carrying the caller's address and user agent
//! for consent and GDPR evidence. The address honours [`TrustedProxies`].

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Query};
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap};
use axum::Json;

use crate::error::{AppError, FieldError};

/// Longest user agent string kept as evidence.
pub const MAX_USER_AGENT_LEN: usize = 512;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns every rejected field on failure.
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
///     // use req...
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::InvalidFields)?;
    Ok(value)
}

/// Extract a query string, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Collects field errors while validating a request.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Record the error of a failed parse.
    pub fn check<T, E: std::fmt::Display>(&mut self, field: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.add(field, e.to_string());
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

// ── Client context ──────────────────────────────────────────────────────────

/// Network evidence about the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Number of reverse proxies in front of the service.
///
/// Each trusted proxy appends one `x-forwarded-for` entry, so only the
/// last `n` entries are trusted. Installed as a request extension; when
/// absent no proxy header is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedProxies(pub usize);

/// Client address as seen by the outermost trusted proxy.
///
/// With no trusted proxies the socket peer is the client and proxy headers
/// are ignored. Otherwise the `x-forwarded-for` entry written by the first
/// trusted proxy wins, then `cf-connecting-ip`, then `x-real-ip`, then the
/// socket peer. Entries to its left are client-controlled and never used.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let peer = || {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };
    let hops = extensions.get::<TrustedProxies>().copied().unwrap_or_default().0;
    if hops == 0 {
        return peer();
    }

    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header_value("x-forwarded-for") {
        let chain: Vec<&str> = forwarded
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(entry) = chain.get(chain.len().saturating_sub(hops)) {
            return Some((*entry).to_string());
        }
    }
    header_value("cf-connecting-ip")
        .or_else(|| header_value("x-real-ip"))
        .map(str::to_string)
        .or_else(peer)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(MAX_USER_AGENT_LEN).collect())
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            ip_address: client_ip(&parts.headers, &parts.extensions),
            user_agent: user_agent(&parts.headers),
        })
    }
}
