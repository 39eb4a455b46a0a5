//! 认证服务：校验登录凭证并签发访问令牌

use crate::{
    auth::jwt::TokenService,
    error::{AppError, AuthError},
    models::auth::{LoginRequest, LoginResponse},
    repository::CredentialStore,
};
use std::sync::Arc;
use validator::Validate;

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        // 不指明是哪个字段有问题
        req.validate()
            .map_err(|_| AppError::BadRequest("invalid payload".to_string()))?;

        let principal = match self.store.authenticate_user(&req.email, &req.password).await {
            Ok(principal) => principal,
            Err(e) => {
                let outcome = match e {
                    AuthError::StoreUnavailable(_) => "error",
                    _ => "failure",
                };
                metrics::counter!("login_attempts_total", "outcome" => outcome).increment(1);
                tracing::info!(outcome, "Login rejected");
                return Err(e.into());
            }
        };

        // 签发令牌
        let issued = self.tokens.issue(&principal)?;

        metrics::counter!("login_attempts_total", "outcome" => "success").increment(1);
        tracing::info!(user_id = %principal.user_id, "Login succeeded");

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }
}
