//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OffgridError;

/// Role assigned to users that were created without one.
pub const DEFAULT_ROLE: &str = "viewer";

/// Role carrying full administrative access.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Argon2id PHC string. Never leaves the process in serialized form.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub tenant_id: Uuid,
    /// Primary role (e.g. `admin`, `editor`, `viewer`).
    pub role: String,
    /// Additional roles for fine-grained access.
    #[serde(default)]
    pub roles: Vec<String>,
    pub is_active: bool,
    pub email_verified: bool,
    #[serde(skip_serializing, default)]
    pub verification_token: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Primary role first, then the secondary roles in stored order.
    pub fn all_roles(&self) -> Vec<String> {
        let mut roles = Vec::with_capacity(1 + self.roles.len());
        if !self.role.is_empty() {
            roles.push(self.role.clone());
        }
        roles.extend(self.roles.iter().cloned());
        roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role || self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    /// Already-hashed password; empty for users that only use API keys.
    pub password_hash: String,
    /// Defaults to [`DEFAULT_ROLE`] when empty.
    pub role: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub verification_token: Option<String>,
}

impl CreateUser {
    /// Check required fields and fill in the default role.
    pub fn validate(&mut self) -> Result<(), OffgridError> {
        if self.email.trim().is_empty() {
            return Err(OffgridError::validation("user email is required"));
        }
        if self.tenant_id.is_nil() {
            return Err(OffgridError::validation("user must belong to a tenant"));
        }
        if self.role.trim().is_empty() {
            self.role = DEFAULT_ROLE.to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub roles: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub verification_token: Option<Option<String>>,
}
