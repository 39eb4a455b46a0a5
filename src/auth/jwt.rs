//! Bearer token issuance and verification (HS256 JWT)
//!
//! A single symmetric secret, fixed for the life of the process, signs and
//! verifies every token. There is no rotation path.

use crate::{
    auth::identity::{AuthMethod, Identity, Principal},
    config::AppConfig,
    error::{AppError, AuthError},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written into and required from every token
pub const TOKEN_ISSUER: &str = "api-gateway";

/// JWT claims carried by a bearer token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,

    /// Issuer
    pub iss: String,

    /// Issued at
    pub iat: i64,

    /// Not before
    pub nbf: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

/// A freshly signed token and the instant it stops being accepted
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token service
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// Create token service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Self::new(
            secret.as_bytes(),
            std::time::Duration::from_secs(config.security.token_ttl_secs),
        )
    }

    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Result<Self, AppError> {
        let ttl = Duration::from_std(ttl)
            .map_err(|e| AppError::Config(format!("Token TTL out of range: {}", e)))?;
        // 过期时间按整秒计算，不足一秒会得到 exp == iat
        if ttl.num_seconds() < 1 {
            return Err(AppError::Config("Token TTL must be at least one second".to_string()));
        }

        // Time bounds are enforced exactly, without clock-skew leeway
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_issuer(&[TOKEN_ISSUER]);
        // iat is not a registered "spec claim" here; Claims deserialization requires it
        validation.set_required_spec_claims(&["sub", "iss", "nbf", "exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    /// Issue a token for an authenticated principal
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, AppError> {
        let now = Utc::now().timestamp();
        let exp = now + self.ttl.num_seconds();

        let claims = Claims {
            sub: principal.user_id.to_string(),
            email: principal.email.clone(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            nbf: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = self.sign(&claims)?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Validate and decode token
    ///
    /// Every failure (malformed, bad signature, wrong issuer, outside
    /// `[nbf, exp)`, bad subject) is reported as `TokenInvalid`.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AuthError::TokenInvalid
            })?
            .claims;

        // jsonwebtoken accepts exp == now; the valid window is half-open
        let now = Utc::now().timestamp();
        if claims.exp <= claims.iat || now < claims.nbf || now >= claims.exp {
            tracing::debug!(nbf = claims.nbf, exp = claims.exp, now, "Token outside validity window");
            return Err(AuthError::TokenInvalid);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;

        Ok(Identity {
            user_id,
            email: claims.email,
            method: AuthMethod::Bearer,
        })
    }
}
