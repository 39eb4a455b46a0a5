//! Authenticated principal and its request-scoped carrier
//!
//! The carrier is the request's `Extensions` map: whatever the gate attaches
//! lives exactly as long as the request and is never shared across requests.

use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, Extensions},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User id and email as stored, before an authentication method is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

/// How the request proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Bearer => "bearer",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful authentication, valid for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub method: AuthMethod,
}

impl Identity {
    pub fn from_principal(principal: Principal, method: AuthMethod) -> Self {
        Self {
            user_id: principal.user_id,
            email: principal.email,
            method,
        }
    }
}

/// Attach an identity to the request, replacing any earlier one.
pub fn attach_identity(extensions: &mut Extensions, identity: Identity) {
    extensions.insert(identity);
}

/// The identity attached by the gate, if any.
pub fn identity_of(extensions: &Extensions) -> Option<&Identity> {
    extensions.get::<Identity>()
}

// Handlers that require an identity extract `Identity` directly
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_of(&parts.extensions)
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(identity_of(&parts.extensions).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "demo@example.com".to_string(),
            method: AuthMethod::ApiKey,
        }
    }

    #[test]
    fn test_absent_identity_is_none() {
        let extensions = Extensions::new();
        assert!(identity_of(&extensions).is_none());
    }

    #[test]
    fn test_attach_then_read() {
        let mut extensions = Extensions::new();
        let identity = sample();

        attach_identity(&mut extensions, identity.clone());
        assert_eq!(identity_of(&extensions), Some(&identity));
    }

    #[test]
    fn test_method_serializes_as_tag() {
        assert_eq!(serde_json::to_value(AuthMethod::Bearer).unwrap(), "bearer");
        assert_eq!(serde_json::to_value(AuthMethod::ApiKey).unwrap(), "api_key");
        assert_eq!(AuthMethod::ApiKey.to_string(), "api_key");
    }

    #[tokio::test]
    async fn test_extractor_rejects_without_identity() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();

        let required = <Identity as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(required, Err(AppError::Unauthorized)));

        let optional =
            <Identity as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert_eq!(optional.unwrap(), None);
    }
}
