//! User and API key domain models

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// User account, provisioned out of band and never mutated by the gateway
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Owner of an active API key, as returned by the key lookup join
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyOwner {
    pub user_id: Uuid,
    pub email: String,
}
