//! API key domain model.
//!
//! The plaintext key is shown exactly once at creation time; only its
//! SHA-256 hash and a short display prefix are ever stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OffgridError;

/// Scope granting unrestricted access.
pub const WILDCARD_SCOPE: &str = "*";

/// Legacy alias of [`WILDCARD_SCOPE`].
pub const ADMIN_SCOPE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    /// Hex-encoded SHA-256 of the plaintext key.
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    /// First 12 characters of the plaintext key, safe to display.
    pub key_prefix: String,
    pub label: String,
    pub tenant_id: Uuid,
    /// `None` for tenant-level keys.
    pub user_id: Option<Uuid>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether the key authorizes `scope`.
    ///
    /// `*` and `admin` grant everything; a stored scope `S` matches `S`
    /// itself and any `S:suffix`.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| {
            s == WILDCARD_SCOPE
                || s == ADMIN_SCOPE
                || s == scope
                || scope
                    .strip_prefix(s.as_str())
                    .is_some_and(|rest| rest.starts_with(':'))
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Active and not expired.
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Whole days until expiry, `Some(0)` once expired, `None` when the
    /// key never expires.
    pub fn days_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).num_days().max(0))
    }

    pub fn validate(&self) -> Result<(), OffgridError> {
        if self.tenant_id.is_nil() {
            return Err(OffgridError::validation("API key must belong to a tenant"));
        }
        if self.label.trim().is_empty() {
            return Err(OffgridError::validation("API key label is required"));
        }
        if self.scopes.is_empty() {
            return Err(OffgridError::validation(
                "API key must have at least one scope",
            ));
        }
        Ok(())
    }
}
