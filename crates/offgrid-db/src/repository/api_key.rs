//! In-memory implementation of [`ApiKeyRepository`].

use chrono::Utc;
use offgrid_core::error::{OffgridError, OffgridResult};
use offgrid_core::models::api_key::ApiKey;
use offgrid_core::repository::ApiKeyRepository;
use uuid::Uuid;

use crate::memory::MemoryDb;

#[derive(Debug, Clone)]
pub struct MemoryApiKeyRepository {
    db: MemoryDb,
}

impl MemoryApiKeyRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

impl ApiKeyRepository for MemoryApiKeyRepository {
    async fn create(&self, key: ApiKey) -> OffgridResult<ApiKey> {
        key.validate()?;
        self.db.write(|t| {
            let duplicate = t.api_keys.contains_key(&key.id)
                || t.api_keys.values().any(|k| k.key_hash == key.key_hash);
            if duplicate {
                return Err(OffgridError::AlreadyExists {
                    entity: "api_key".into(),
                });
            }
            t.api_keys.insert(key.id, key.clone());
            Ok(key)
        })
    }

    async fn get_by_id(&self, id: Uuid) -> OffgridResult<ApiKey> {
        self.db
            .read(|t| t.api_keys.get(&id).cloned())
            .ok_or_else(|| OffgridError::not_found("api_key", id))
    }

    async fn get_by_hash(&self, key_hash: &str) -> OffgridResult<ApiKey> {
        self.db
            .read(|t| t.api_keys.values().find(|k| k.key_hash == key_hash).cloned())
            .ok_or_else(|| OffgridError::not_found("api_key", "hash"))
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> OffgridResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self.db.read(|t| {
            t.api_keys
                .values()
                .filter(|k| k.tenant_id == tenant_id)
                .cloned()
                .collect()
        });
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn count_by_tenant(&self, tenant_id: Uuid) -> OffgridResult<usize> {
        Ok(self
            .db
            .read(|t| t.api_keys.values().filter(|k| k.tenant_id == tenant_id).count()))
    }

    async fn update(&self, key: ApiKey) -> OffgridResult<ApiKey> {
        key.validate()?;
        self.db.write(|t| {
            let stored = t
                .api_keys
                .get_mut(&key.id)
                .ok_or_else(|| OffgridError::not_found("api_key", key.id))?;
            if !stored.is_active && key.is_active {
                return Err(OffgridError::validation(
                    "revoked API keys cannot be reactivated",
                ));
            }
            if stored.key_hash != key.key_hash {
                return Err(OffgridError::validation("API key hash is immutable"));
            }
            *stored = key.clone();
            Ok(key)
        })
    }

    async fn touch_last_used(&self, id: Uuid) -> OffgridResult<()> {
        self.db.write(|t| {
            let key = t
                .api_keys
                .get_mut(&id)
                .ok_or_else(|| OffgridError::not_found("api_key", id))?;
            key.last_used_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn revoke(&self, id: Uuid) -> OffgridResult<()> {
        self.db.write(|t| {
            let key = t
                .api_keys
                .get_mut(&id)
                .ok_or_else(|| OffgridError::not_found("api_key", id))?;
            key.is_active = false;
            Ok(())
        })
    }

    async fn delete(&self, id: Uuid) -> OffgridResult<()> {
        self.db
            .write(|t| t.api_keys.remove(&id))
            .map(|_| ())
            .ok_or_else(|| OffgridError::not_found("api_key", id))
    }
}
