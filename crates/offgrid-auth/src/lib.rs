//! OffGridFlow Auth: API keys, RBAC, login lockout, password hashing
//! and signed session tokens.

pub mod api_key;
pub mod config;
pub mod context;
pub mod error;
pub mod lockout;
pub mod password;
pub mod rbac;
pub mod service;
pub mod session;

pub use config::AuthConfig;
pub use context::AuthContext;
pub use error::AuthError;
pub use lockout::{FailureOutcome, LockoutInfo, LockoutManager};
pub use rbac::{Authorizer, Permission, RbacAuthorizer};
pub use service::{
    ApiKeyIdentity, AuthService, LoginOutput, NewUser, SessionIdentity, TenantBootstrap,
};
pub use session::{SessionClaims, SessionManager};
