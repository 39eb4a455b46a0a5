//! 测试公共模块
//! 提供内存凭证存储、测试配置和应用构建工具

#![allow(dead_code)]

use api_gateway::{
    auth::{identity::Principal, password::PasswordHasher},
    config::{
        AppConfig, DatabaseConfig, LoggingConfig, ProxyConfig, SecurityConfig, ServerConfig,
    },
    db::HealthStatus,
    error::AuthError,
    middleware::AppState,
    repository::CredentialStore,
    routes,
};
use async_trait::async_trait;
use axum::{body::Body, http::Response, Router};
use http_body_util::BodyExt;
use secrecy::Secret;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const TEST_TTL_SECS: u64 = 300;

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo-password";
pub const DEMO_API_KEY: &str = "demo-key-123";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    create_test_config_with_routes(Vec::new())
}

/// 创建带转发路由的测试配置
pub fn create_test_config_with_routes(routes: Vec<String>) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            request_timeout_secs: 10,
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: Secret::new("postgresql://localhost/unused".to_string()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new(TEST_SECRET.to_string()),
            token_ttl_secs: TEST_TTL_SECS,
            api_key_header: "X-API-Key".to_string(),
            bypass_paths: vec![
                "/healthz*".to_string(),
                "/readyz".to_string(),
                "/auth/login".to_string(),
            ],
        },
        proxy: ProxyConfig {
            routes,
            upstream_timeout_secs: 5,
        },
    }
}

struct StoredUser {
    id: Uuid,
    password_hash: String,
}

struct StoredKey {
    owner: Principal,
    revoked: bool,
}

/// 内存凭证存储，行为与 PostgreSQL 实现一致
pub struct MemoryCredentialStore {
    hasher: PasswordHasher,
    dummy_hash: String,
    users: RwLock<HashMap<String, StoredUser>>,
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        // 测试使用低成本参数
        let hasher = PasswordHasher::with_params(1024, 1, 1);
        let dummy_hash = hasher.hash("unknown-user-placeholder").unwrap();

        Self {
            hasher,
            dummy_hash,
            users: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// 写入演示用户和 API Key
    pub fn with_demo_data() -> (Self, Uuid) {
        let store = Self::new();
        let user_id = store.add_user(DEMO_EMAIL, DEMO_PASSWORD);
        store.add_api_key(DEMO_EMAIL, DEMO_API_KEY);
        (store, user_id)
    }

    pub fn add_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        let password_hash = self.hasher.hash(password).unwrap();
        self.users
            .write()
            .unwrap()
            .insert(email.to_string(), StoredUser { id, password_hash });
        id
    }

    pub fn add_api_key(&self, email: &str, key: &str) {
        let user_id = self.users.read().unwrap().get(email).unwrap().id;
        self.keys.write().unwrap().insert(
            key.to_string(),
            StoredKey {
                owner: Principal {
                    user_id,
                    email: email.to_string(),
                },
                revoked: false,
            },
        );
    }

    pub fn revoke_api_key(&self, key: &str) {
        if let Some(stored) = self.keys.write().unwrap().get_mut(key) {
            stored.revoked = true;
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn authenticate_user(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let found = self
            .users
            .read()
            .unwrap()
            .get(email)
            .map(|u| (u.id, u.password_hash.clone()));

        match found {
            Some((user_id, hash)) => {
                self.hasher.verify(password, &hash)?;
                Ok(Principal {
                    user_id,
                    email: email.to_string(),
                })
            }
            None => {
                let _ = self.hasher.verify(password, &self.dummy_hash);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn lookup_api_key(&self, key: &str) -> Result<Principal, AuthError> {
        self.keys
            .read()
            .unwrap()
            .get(key)
            .filter(|k| !k.revoked)
            .map(|k| k.owner.clone())
            .ok_or(AuthError::ApiKeyNotFound)
    }

    async fn ping(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// 始终不可用的凭证存储
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn authenticate_user(&self, _email: &str, _password: &str) -> Result<Principal, AuthError> {
        Err(AuthError::StoreUnavailable("connection refused".to_string()))
    }

    async fn lookup_api_key(&self, _key: &str) -> Result<Principal, AuthError> {
        Err(AuthError::StoreUnavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> HealthStatus {
        HealthStatus::Unhealthy("connection refused".to_string())
    }
}

/// 每次查询都卡住指定时长的凭证存储
pub struct SlowStore {
    pub delay: std::time::Duration,
}

#[async_trait]
impl CredentialStore for SlowStore {
    async fn authenticate_user(&self, _email: &str, _password: &str) -> Result<Principal, AuthError> {
        tokio::time::sleep(self.delay).await;
        Err(AuthError::InvalidCredentials)
    }

    async fn lookup_api_key(&self, _key: &str) -> Result<Principal, AuthError> {
        tokio::time::sleep(self.delay).await;
        Err(AuthError::ApiKeyNotFound)
    }

    async fn ping(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// 创建测试应用状态
pub fn create_test_app_state(config: AppConfig, store: Arc<dyn CredentialStore>) -> Arc<AppState> {
    Arc::new(AppState::new(config, store).expect("Failed to create app state"))
}

/// 创建测试应用
pub fn create_test_app(store: Arc<dyn CredentialStore>) -> (Router, Arc<AppState>) {
    let state = create_test_app_state(create_test_config(), store);
    (routes::create_router(state.clone()), state)
}

/// 读取 JSON 响应体
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
