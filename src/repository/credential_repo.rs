//! Credential repository (PostgreSQL 凭证数据访问)

use super::CredentialStore;
use crate::{
    auth::{identity::Principal, password::PasswordHasher},
    db::{self, HealthStatus},
    error::{AppError, AuthError},
    models::user::{ApiKeyOwner, User},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinError;

pub struct PgCredentialStore {
    db: PgPool,
    hasher: PasswordHasher,
    // 未知邮箱时用于比对的哈希，使两种失败耗时一致
    dummy_hash: Arc<str>,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Result<Self, AppError> {
        Self::with_hasher(db, PasswordHasher::new())
    }

    pub fn with_hasher(db: PgPool, hasher: PasswordHasher) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash("unknown-user-placeholder")?;

        Ok(Self {
            db,
            hasher,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// 在阻塞线程池中校验密码，避免占用异步工作线程
    async fn verify_password(&self, password: &str, hash: Arc<str>) -> Result<(), AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        join_verification(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await)
    }
}

/// 校验任务崩溃或被取消属于服务端故障，不能当作凭证错误
fn join_verification(
    joined: Result<Result<(), AuthError>, JoinError>,
) -> Result<(), AuthError> {
    joined.map_err(|e| {
        tracing::error!("Password verification task failed: {}", e);
        AuthError::StoreUnavailable("password verification task failed".to_string())
    })?
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1 LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            tracing::error!("User lookup failed: {}", e);
            AuthError::from(e)
        })?;

        let Some(user) = user else {
            let _ = self.verify_password(password, self.dummy_hash.clone()).await;
            return Err(AuthError::InvalidCredentials);
        };

        self.verify_password(password, Arc::from(user.password_hash))
            .await?;

        Ok(Principal {
            user_id: user.id,
            email: user.email,
        })
    }

    async fn lookup_api_key(&self, key: &str) -> Result<Principal, AuthError> {
        let owner = sqlx::query_as::<_, ApiKeyOwner>(
            r#"
            SELECT ak.user_id, u.email
            FROM api_keys ak
            JOIN users u ON ak.user_id = u.id
            WHERE ak.key = $1
              AND ak.revoked = FALSE
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            tracing::error!("API key lookup failed: {}", e);
            AuthError::from(e)
        })?
        .ok_or(AuthError::ApiKeyNotFound)?;

        Ok(Principal {
            user_id: owner.user_id,
            email: owner.email,
        })
    }

    async fn ping(&self) -> HealthStatus {
        db::record_pool_metrics(&self.db);
        db::health_check(&self.db).await
    }
}
