//! Authentication module

pub mod gate;
pub mod identity;
pub mod jwt;
pub mod password;

pub use gate::{auth_middleware, parse_bearer, AuthGate, BypassList};
pub use identity::{attach_identity, identity_of, AuthMethod, Identity, Principal};
pub use jwt::{Claims, IssuedToken, TokenService, TOKEN_ISSUER};
pub use password::PasswordHasher;
