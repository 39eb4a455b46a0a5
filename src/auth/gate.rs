//! Authentication gate
//!
//! Every request outside the bypass list passes through here. Bearer tokens
//! are tried first; if there is none, or it does not verify, the configured
//! API-key header is tried. Credential failures collapse into one
//! `Unauthenticated` rejection. A store outage is passed through unchanged so
//! it surfaces as a server fault instead of a 401.

use crate::{
    auth::{
        identity::{attach_identity, AuthMethod, Identity},
        jwt::TokenService,
    },
    config::SecurityConfig,
    error::{AppError, AuthError},
    repository::CredentialStore,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Paths that skip authentication
#[derive(Debug, Clone, Default)]
pub struct BypassList {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl BypassList {
    /// Entries ending in `*` match by prefix, all others match exactly.
    pub fn new<I, T>(paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut list = Self::default();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            match path.strip_suffix('*') {
                Some(prefix) => list.prefixes.push(prefix.to_string()),
                None => list.exact.push(path.to_string()),
            }
        }
        list
    }

    pub fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
/// The scheme is case-insensitive; an empty token counts as absent.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub struct AuthGate {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
    api_key_header: HeaderName,
    bypass: BypassList,
}

impl AuthGate {
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn CredentialStore>,
        security: &SecurityConfig,
    ) -> Result<Self, AppError> {
        let api_key_header = HeaderName::from_bytes(security.api_key_header.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid API key header name: {}", e)))?;

        Ok(Self {
            tokens,
            store,
            api_key_header,
            bypass: BypassList::new(&security.bypass_paths),
        })
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.matches(path)
    }

    /// Decide whether the headers carry a valid proof of identity.
    /// Nothing is cached; every call verifies from scratch.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
        {
            match self.tokens.verify(token) {
                Ok(identity) => {
                    record_attempt(AuthMethod::Bearer, "success");
                    return Ok(identity);
                }
                Err(_) => record_attempt(AuthMethod::Bearer, "failure"),
            }
        }

        let api_key = headers
            .get(&self.api_key_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(key) = api_key {
            match self.store.lookup_api_key(key).await {
                Ok(principal) => {
                    record_attempt(AuthMethod::ApiKey, "success");
                    return Ok(Identity::from_principal(principal, AuthMethod::ApiKey));
                }
                Err(AuthError::StoreUnavailable(msg)) => {
                    record_attempt(AuthMethod::ApiKey, "error");
                    return Err(AuthError::StoreUnavailable(msg));
                }
                Err(_) => record_attempt(AuthMethod::ApiKey, "failure"),
            }
        }

        Err(AuthError::Unauthenticated)
    }
}

fn record_attempt(method: AuthMethod, outcome: &'static str) {
    metrics::counter!("auth_attempts_total", "method" => method.as_str(), "outcome" => outcome)
        .increment(1);
}

/// 认证中间件：放行免认证路径，其余请求必须通过网关校验
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if gate.is_bypassed(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let identity = gate.authenticate(req.headers()).await.map_err(|e| {
        if e.is_credential_failure() {
            tracing::debug!(path = %req.uri().path(), "Request rejected: unauthenticated");
        } else {
            tracing::error!(path = %req.uri().path(), error = %e, "Authentication could not be evaluated");
        }
        AppError::from(e)
    })?;

    let span = tracing::Span::current();
    span.record("user_id", tracing::field::display(identity.user_id));
    span.record("auth_method", identity.method.as_str());

    attach_identity(req.extensions_mut(), identity);

    Ok(next.run(req).await)
}
