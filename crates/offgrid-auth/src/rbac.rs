//! Role-based access control.
//!
//! A role maps to a list of [`Permission`]s. A user is authorized when
//! any of their roles (primary first, then secondary) holds a matching
//! permission. Denial is `Ok(false)`; the error channel is reserved for
//! authorizer failures.

use std::collections::HashMap;

use offgrid_core::models::user::User;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Matches any action or resource.
pub const WILDCARD: &str = "*";

pub mod actions {
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
    pub const ADMIN: &str = "admin";
}

pub mod resources {
    pub const EMISSIONS: &str = "emissions";
    pub const ACTIVITIES: &str = "activities";
    pub const COMPLIANCE: &str = "compliance";
    pub const REPORTING: &str = "reporting";
    pub const BILLING: &str = "billing";
    pub const USERS: &str = "users";
    pub const API_KEYS: &str = "apikeys";
    pub const SETTINGS: &str = "settings";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: String,
    pub resource: String,
}

impl Permission {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
        }
    }

    /// Whether this permission grants `action` on `resource`.
    pub fn matches(&self, action: &str, resource: &str) -> bool {
        (self.action == WILDCARD || self.action == action)
            && (self.resource == WILDCARD || self.resource == resource)
    }
}

/// Authorization decision point.
pub trait Authorizer: Send + Sync {
    /// `Ok(true)` if `user` may perform `action` on `resource`.
    fn authorize(&self, user: &User, action: &str, resource: &str) -> Result<bool, AuthError>;

    fn can_read(&self, user: &User, resource: &str) -> bool {
        self.authorize(user, actions::READ, resource).unwrap_or(false)
    }

    fn can_write(&self, user: &User, resource: &str) -> bool {
        self.authorize(user, actions::WRITE, resource).unwrap_or(false)
    }

    fn can_delete(&self, user: &User, resource: &str) -> bool {
        self.authorize(user, actions::DELETE, resource).unwrap_or(false)
    }

    fn can_admin(&self, user: &User, resource: &str) -> bool {
        self.authorize(user, actions::ADMIN, resource).unwrap_or(false)
    }
}

/// Authorizer backed by an in-process role table.
///
/// Each instance owns its table; role changes on one instance are not
/// visible to another.
#[derive(Debug)]
pub struct RbacAuthorizer {
    roles: RwLock<HashMap<String, Vec<Permission>>>,
}

impl Default for RbacAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RbacAuthorizer {
    /// Authorizer with the built-in `admin`, `editor` and `viewer` roles.
    pub fn new() -> Self {
        use actions::{READ, WRITE};
        use resources::*;

        let mut roles = HashMap::new();
        roles.insert(
            "admin".to_string(),
            vec![Permission::new(WILDCARD, WILDCARD)],
        );
        roles.insert(
            "editor".to_string(),
            vec![
                Permission::new(READ, EMISSIONS),
                Permission::new(WRITE, EMISSIONS),
                Permission::new(READ, ACTIVITIES),
                Permission::new(WRITE, ACTIVITIES),
                Permission::new(READ, COMPLIANCE),
                Permission::new(WRITE, COMPLIANCE),
                Permission::new(READ, REPORTING),
                Permission::new(READ, SETTINGS),
            ],
        );
        roles.insert(
            "viewer".to_string(),
            vec![
                Permission::new(READ, EMISSIONS),
                Permission::new(READ, ACTIVITIES),
                Permission::new(READ, COMPLIANCE),
                Permission::new(READ, REPORTING),
            ],
        );
        Self::with_roles(roles)
    }

    pub fn with_roles(roles: HashMap<String, Vec<Permission>>) -> Self {
        Self {
            roles: RwLock::new(roles),
        }
    }

    /// Insert or replace a role.
    pub fn add_role(&self, role: impl Into<String>, permissions: Vec<Permission>) {
        self.roles.write().insert(role.into(), permissions);
    }

    pub fn remove_role(&self, role: &str) -> bool {
        self.roles.write().remove(role).is_some()
    }

    /// Snapshot of a role's permissions; `None` for unknown roles.
    pub fn role_permissions(&self, role: &str) -> Option<Vec<Permission>> {
        self.roles.read().get(role).cloned()
    }

    pub fn list_roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.roles.read().keys().cloned().collect();
        roles.sort();
        roles
    }
}

impl Authorizer for RbacAuthorizer {
    fn authorize(&self, user: &User, action: &str, resource: &str) -> Result<bool, AuthError> {
        let table = self.roles.read();
        let granted = user.all_roles().iter().any(|role| {
            table
                .get(role)
                .is_some_and(|perms| perms.iter().any(|p| p.matches(action, resource)))
        });
        Ok(granted)
    }
}
