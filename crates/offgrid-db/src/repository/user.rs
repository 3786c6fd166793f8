//! In-memory implementation of [`UserRepository`].
//!
//! Passwords arrive already hashed; this layer never sees plaintext.
//! Email uniqueness is enforced across all tenants since login looks
//! users up by email alone.

use chrono::Utc;
use offgrid_core::error::{OffgridError, OffgridResult};
use offgrid_core::models::user::{CreateUser, UpdateUser, User};
use offgrid_core::repository::UserRepository;
use uuid::Uuid;

use crate::memory::MemoryDb;

#[derive(Debug, Clone)]
pub struct MemoryUserRepository {
    db: MemoryDb,
}

impl MemoryUserRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) -> OffgridResult<User> {
        self.db.write(|t| {
            let user = t
                .users
                .get_mut(&id)
                .ok_or_else(|| OffgridError::not_found("user", id))?;
            f(user);
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, mut input: CreateUser) -> OffgridResult<User> {
        input.validate()?;
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            email: input.email,
            name: input.name,
            password_hash: input.password_hash,
            tenant_id: input.tenant_id,
            role: input.role,
            roles: input.roles,
            is_active: input.is_active,
            email_verified: input.email_verified,
            verification_token: input.verification_token,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.write(|t| {
            if t.users.values().any(|u| u.email == user.email) {
                return Err(OffgridError::AlreadyExists {
                    entity: "user".into(),
                });
            }
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn get_by_id(&self, id: Uuid) -> OffgridResult<User> {
        self.db
            .read(|t| t.users.get(&id).cloned())
            .ok_or_else(|| OffgridError::not_found("user", id))
    }

    async fn get_by_email(&self, email: &str) -> OffgridResult<User> {
        self.db
            .read(|t| t.users.values().find(|u| u.email == email).cloned())
            .ok_or_else(|| OffgridError::not_found("user", email))
    }

    async fn get_by_verification_token(&self, token: &str) -> OffgridResult<User> {
        if token.is_empty() {
            return Err(OffgridError::not_found("user", "verification token"));
        }
        self.db
            .read(|t| {
                t.users
                    .values()
                    .find(|u| u.verification_token.as_deref() == Some(token))
                    .cloned()
            })
            .ok_or_else(|| OffgridError::not_found("user", "verification token"))
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> OffgridResult<Vec<User>> {
        let mut users: Vec<User> = self.db.read(|t| {
            t.users
                .values()
                .filter(|u| u.tenant_id == tenant_id)
                .cloned()
                .collect()
        });
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> OffgridResult<User> {
        self.db.write(|t| {
            if let Some(email) = &input.email {
                if t.users.values().any(|u| u.id != id && &u.email == email) {
                    return Err(OffgridError::AlreadyExists {
                        entity: "user".into(),
                    });
                }
            }

            let user = t
                .users
                .get_mut(&id)
                .ok_or_else(|| OffgridError::not_found("user", id))?;
            if let Some(email) = input.email {
                user.email = email;
            }
            if let Some(name) = input.name {
                user.name = name;
            }
            if let Some(role) = input.role {
                user.role = role;
            }
            if let Some(roles) = input.roles {
                user.roles = roles;
            }
            if let Some(is_active) = input.is_active {
                user.is_active = is_active;
            }
            if let Some(verified) = input.email_verified {
                user.email_verified = verified;
            }
            if let Some(token) = input.verification_token {
                user.verification_token = token;
            }
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
    }

    async fn update_last_login(&self, id: Uuid) -> OffgridResult<()> {
        self.modify(id, |user| user.last_login_at = Some(Utc::now()))
            .map(|_| ())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> OffgridResult<()> {
        self.modify(id, |user| user.password_hash = password_hash.to_string())
            .map(|_| ())
    }

    async fn delete(&self, id: Uuid) -> OffgridResult<()> {
        self.db
            .write(|t| t.users.remove(&id))
            .map(|_| ())
            .ok_or_else(|| OffgridError::not_found("user", id))
    }
}
