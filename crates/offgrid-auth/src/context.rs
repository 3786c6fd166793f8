//! Request-scoped identity.

use offgrid_core::models::api_key::ApiKey;
use offgrid_core::models::tenant::Tenant;
use offgrid_core::models::user::User;
use uuid::Uuid;

use crate::error::AuthError;

/// Identity resolved for one request: tenant, user and the API key used,
/// any of which may be absent.
///
/// A bare tenant id can be attached before the full tenant is loaded.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    tenant: Option<Tenant>,
    tenant_id: Option<Uuid>,
    user: Option<User>,
    api_key: Option<ApiKey>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenant_id = Some(tenant.id);
        self.tenant = Some(tenant);
        self
    }

    /// Attach only a tenant id. Ignored for the nil id or if a tenant is
    /// already present.
    pub fn with_tenant_id(mut self, tenant_id: Uuid) -> Self {
        if !tenant_id.is_nil() && self.tenant_id().is_none() {
            self.tenant_id = Some(tenant_id);
        }
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    /// Tenant id from the full tenant if present, else from
    /// [`with_tenant_id`](Self::with_tenant_id).
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant.as_ref().map(|t| t.id).or(self.tenant_id)
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    pub fn require_tenant(&self) -> Result<&Tenant, AuthError> {
        self.tenant.as_ref().ok_or(AuthError::Unauthorized)
    }

    pub fn require_user(&self) -> Result<&User, AuthError> {
        self.user.as_ref().ok_or(AuthError::Unauthorized)
    }

    pub fn require_api_key(&self) -> Result<&ApiKey, AuthError> {
        self.api_key.as_ref().ok_or(AuthError::Unauthorized)
    }

    /// # Panics
    ///
    /// Panics if no tenant is attached.
    pub fn must_tenant(&self) -> &Tenant {
        match &self.tenant {
            Some(tenant) => tenant,
            None => panic!("tenant required in auth context"),
        }
    }

    /// # Panics
    ///
    /// Panics if no user is attached.
    pub fn must_user(&self) -> &User {
        match &self.user {
            Some(user) => user,
            None => panic!("user required in auth context"),
        }
    }
}
