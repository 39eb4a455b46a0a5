//! Database repository layer
//!
//! `CredentialStore` is the seam between the authentication pipeline and
//! persisted principals. Both queries are read-only and hold no state beyond
//! the connection pool, so one store is shared by every request.

pub mod credential_repo;

pub use credential_repo::PgCredentialStore;

use crate::{auth::identity::Principal, db::HealthStatus, error::AuthError};
use async_trait::async_trait;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check an email/password pair. Unknown email and wrong password both
    /// yield `InvalidCredentials`.
    async fn authenticate_user(&self, email: &str, password: &str)
        -> Result<Principal, AuthError>;

    /// Resolve an API key to its owner. Missing and revoked keys both yield
    /// `ApiKeyNotFound`.
    async fn lookup_api_key(&self, key: &str) -> Result<Principal, AuthError>;

    /// Readiness of the backing storage
    async fn ping(&self) -> HealthStatus;
}
