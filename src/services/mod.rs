//! Business logic services layer

pub mod auth_service;
pub mod proxy_service;

pub use auth_service::AuthService;
pub use proxy_service::ProxyService;
