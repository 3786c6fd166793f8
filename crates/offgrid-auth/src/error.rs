//! Authentication and authorization error types.
//!
//! Expected denials (a role lacking a permission, a locked identity) are
//! ordinary return values elsewhere in this crate. The variants below
//! are reserved for rejected requests and genuine failures.

use chrono::{DateTime, Utc};
use offgrid_core::error::OffgridError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,

    /// Unknown, revoked or expired API key, or a wrong password.
    /// Deliberately uniform.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid email or password ({remaining_attempts} attempts remaining)")]
    LoginFailed { remaining_attempts: u32 },

    #[error("too many failed login attempts, account temporarily locked")]
    AccountLocked { locked_until: Option<DateTime<Utc>> },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {action} on {resource}")]
    Forbidden { action: String, resource: String },

    #[error("API key does not have required scope {scope:?}")]
    InvalidScope { scope: String },

    #[error("email address has not been verified")]
    EmailNotVerified,

    #[error("invalid session token: {0}")]
    TokenInvalid(String),

    #[error("session token has expired")]
    TokenExpired,

    #[error("session secret is required")]
    SessionSecretRequired,

    #[error("session secret must be at least {min} bytes")]
    SessionSecretTooShort { min: usize },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to generate secure key: {0}")]
    KeyGeneration(String),

    #[error("tenant has reached maximum API key limit ({limit})")]
    KeyLimitReached { limit: usize },

    #[error("invalid or expired reset token")]
    ResetTokenInvalid,

    #[error("invalid or expired verification token")]
    VerificationTokenInvalid,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("failed to {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: OffgridError,
    },
}

impl AuthError {
    /// Wrap a store failure with the operation that produced it.
    /// Validation failures keep their kind.
    pub fn store(context: &'static str, source: OffgridError) -> Self {
        match source {
            OffgridError::Validation { message } => AuthError::Validation(message),
            source => AuthError::Store { context, source },
        }
    }

    /// Whether the error stems from a missing or rejected identity
    /// (401-equivalent) as opposed to a permission decision or a failure.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingApiKey
                | AuthError::InvalidCredentials
                | AuthError::LoginFailed { .. }
                | AuthError::AccountLocked { .. }
                | AuthError::Unauthorized
                | AuthError::EmailNotVerified
                | AuthError::TokenInvalid(_)
                | AuthError::TokenExpired
        )
    }
}

impl From<OffgridError> for AuthError {
    fn from(err: OffgridError) -> Self {
        AuthError::store("access store", err)
    }
}
