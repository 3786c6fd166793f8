//! In-memory implementation of [`TenantRepository`].

use chrono::Utc;
use offgrid_core::error::{OffgridError, OffgridResult};
use offgrid_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use offgrid_core::repository::TenantRepository;
use uuid::Uuid;

use crate::memory::MemoryDb;

#[derive(Debug, Clone)]
pub struct MemoryTenantRepository {
    db: MemoryDb,
}

impl MemoryTenantRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

/// `base` plus the random tail of the id; `tenant` stands in for an
/// empty base.
fn suffixed_slug(base: &str, id: Uuid) -> String {
    let simple = id.simple().to_string();
    let suffix = &simple[simple.len() - 8..];
    let base = if base.is_empty() { "tenant" } else { base };
    format!("{base}-{suffix}")
}

impl TenantRepository for MemoryTenantRepository {
    /// An explicit slug must be unique. A slug derived from the name is
    /// made unique with a suffix taken from the tenant id instead.
    async fn create(&self, input: CreateTenant) -> OffgridResult<Tenant> {
        input.validate()?;
        let explicit_slug = input.slug.as_deref().is_some_and(|s| !s.trim().is_empty());
        let now = Utc::now();
        let mut tenant = Tenant {
            id: Uuid::now_v7(),
            slug: input.resolved_slug(),
            name: input.name.trim().to_string(),
            plan: input.plan,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        self.db.write(|t| {
            let taken = t.tenants.values().any(|existing| existing.slug == tenant.slug);
            if explicit_slug && taken {
                return Err(OffgridError::AlreadyExists {
                    entity: "tenant".into(),
                });
            }
            if !explicit_slug && (taken || tenant.slug.is_empty()) {
                tenant.slug = suffixed_slug(&tenant.slug, tenant.id);
            }
            t.tenants.insert(tenant.id, tenant.clone());
            Ok(tenant)
        })
    }

    async fn get_by_id(&self, id: Uuid) -> OffgridResult<Tenant> {
        self.db
            .read(|t| t.tenants.get(&id).cloned())
            .ok_or_else(|| OffgridError::not_found("tenant", id))
    }

    async fn get_by_slug(&self, slug: &str) -> OffgridResult<Tenant> {
        self.db
            .read(|t| t.tenants.values().find(|x| x.slug == slug).cloned())
            .ok_or_else(|| OffgridError::not_found("tenant", slug))
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> OffgridResult<Tenant> {
        self.db.write(|t| {
            let slug_taken = input
                .slug
                .as_ref()
                .is_some_and(|slug| t.tenants.values().any(|x| x.id != id && &x.slug == slug));
            if slug_taken {
                return Err(OffgridError::AlreadyExists {
                    entity: "tenant".into(),
                });
            }

            let tenant = t
                .tenants
                .get_mut(&id)
                .ok_or_else(|| OffgridError::not_found("tenant", id))?;

            let mut updated = tenant.clone();
            if let Some(name) = input.name {
                updated.name = name;
            }
            if let Some(slug) = input.slug {
                updated.slug = slug;
            }
            if let Some(plan) = input.plan {
                updated.plan = plan;
            }
            if let Some(is_active) = input.is_active {
                updated.is_active = is_active;
            }
            updated.validate()?;
            updated.updated_at = Utc::now();

            *tenant = updated.clone();
            Ok(updated)
        })
    }

    async fn delete(&self, id: Uuid) -> OffgridResult<()> {
        self.db
            .write(|t| t.tenants.remove(&id))
            .map(|_| ())
            .ok_or_else(|| OffgridError::not_found("tenant", id))
    }

    async fn list(&self) -> OffgridResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.db.read(|t| t.tenants.values().cloned().collect());
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }
}
