//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and must be safe for concurrent
//! use. Implementations guarantee unique ids and report updates of an
//! unknown id as [`OffgridError::NotFound`](crate::error::OffgridError::NotFound)
//! rather than silently upserting.

use uuid::Uuid;

use crate::error::OffgridResult;
use crate::models::{
    api_key::ApiKey,
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, UpdateUser, User},
};

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = OffgridResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OffgridResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = OffgridResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = OffgridResult<Tenant>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
    fn list(&self) -> impl Future<Output = OffgridResult<Vec<Tenant>>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = OffgridResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OffgridResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = OffgridResult<User>> + Send;
    fn get_by_verification_token(
        &self,
        token: &str,
    ) -> impl Future<Output = OffgridResult<User>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = OffgridResult<Vec<User>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = OffgridResult<User>> + Send;
    fn update_last_login(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
    fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> impl Future<Output = OffgridResult<()>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
}

pub trait ApiKeyRepository: Send + Sync {
    /// Persist a key produced by the key generator.
    fn create(&self, key: ApiKey) -> impl Future<Output = OffgridResult<ApiKey>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OffgridResult<ApiKey>> + Send;
    /// Authentication lookup; the plaintext key is never passed to storage.
    fn get_by_hash(&self, key_hash: &str) -> impl Future<Output = OffgridResult<ApiKey>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = OffgridResult<Vec<ApiKey>>> + Send;
    fn count_by_tenant(&self, tenant_id: Uuid) -> impl Future<Output = OffgridResult<usize>> + Send;
    fn update(&self, key: ApiKey) -> impl Future<Output = OffgridResult<ApiKey>> + Send;
    fn touch_last_used(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
    /// Irreversibly mark the key inactive.
    fn revoke(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = OffgridResult<()>> + Send;
}
