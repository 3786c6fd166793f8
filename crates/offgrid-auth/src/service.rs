//! Authentication service: API key validation, tenant bootstrap, user
//! login and password flows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use offgrid_core::error::OffgridError;
use offgrid_core::models::api_key::{ApiKey, WILDCARD_SCOPE};
use offgrid_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use offgrid_core::models::user::{ADMIN_ROLE, CreateUser, UpdateUser, User};
use offgrid_core::repository::{ApiKeyRepository, TenantRepository, UserRepository};
use parking_lot::Mutex;
use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api_key::{self, GeneratedApiKey, KeyEnvironment};
use crate::config::{AuthConfig, ServiceConfig};
use crate::error::AuthError;
use crate::lockout::LockoutManager;
use crate::password::{PasswordManager, validate_password};
use crate::rbac::{Authorizer, RbacAuthorizer};
use crate::session::{SessionClaims, SessionManager};

const RESET_TOKEN_BYTES: usize = 24;
const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;
const VERIFICATION_TOKEN_BYTES: usize = 24;
const BOOTSTRAP_KEY_LABEL: &str = "Default API Key";

/// Identity resolved from a valid API key.
#[derive(Debug, Clone)]
pub struct ApiKeyIdentity {
    pub tenant: Tenant,
    /// Owning user, if the key belongs to one that still exists.
    pub user: Option<User>,
    pub api_key: ApiKey,
}

/// Everything created by [`AuthService::create_tenant`].
#[derive(Debug, Clone)]
pub struct TenantBootstrap {
    pub tenant: Tenant,
    pub admin: User,
    /// Plaintext of the admin's first API key. Shown once.
    pub raw_key: String,
    pub api_key: ApiKey,
}

/// Input for [`AuthService::register_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub password: String,
    /// Empty for the default role.
    pub role: String,
    pub roles: Vec<String>,
}

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginOutput {
    /// Signed session token.
    pub token: String,
    pub claims: SessionClaims,
    pub user: User,
    pub tenant: Tenant,
}

/// Identity resolved from a session token.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub claims: SessionClaims,
    pub user: User,
    pub tenant: Tenant,
}

#[derive(Debug, Clone)]
struct PendingReset {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn random_hex(len: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::KeyGeneration(e.to_string()))?;
    Ok(hex::encode(bytes))
}

fn expiry_from_now(lifetime: Duration) -> Result<DateTime<Utc>, AuthError> {
    TimeDelta::from_std(lifetime)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| AuthError::Validation("API key expiry out of range".into()))
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<T, U, K>
where
    T: TenantRepository,
    U: UserRepository,
    K: ApiKeyRepository + 'static,
{
    tenants: T,
    users: U,
    keys: Arc<K>,
    authorizer: Arc<dyn Authorizer>,
    sessions: SessionManager,
    lockout: Arc<LockoutManager>,
    passwords: PasswordManager,
    config: ServiceConfig,
    reset_tokens: Mutex<HashMap<String, PendingReset>>,
}

impl<T, U, K> AuthService<T, U, K>
where
    T: TenantRepository,
    U: UserRepository,
    K: ApiKeyRepository + 'static,
{
    /// Build a service with the default RBAC role table.
    ///
    /// Fails if the session secret is missing or too short, or the
    /// password cost parameters are invalid.
    pub fn new(tenants: T, users: U, keys: K, config: AuthConfig) -> Result<Self, AuthError> {
        let sessions = SessionManager::new(&config.session.secret)?
            .with_ttl(Duration::from_secs(config.session.ttl_secs))
            .with_issuer(config.session.issuer.clone());

        Ok(Self {
            tenants,
            users,
            keys: Arc::new(keys),
            authorizer: Arc::new(RbacAuthorizer::new()),
            sessions,
            lockout: Arc::new(LockoutManager::new(&config.lockout)),
            passwords: PasswordManager::new(&config.password)?,
            config: config.service,
            reset_tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The lockout table. Callers own the sweeper lifecycle through
    /// [`LockoutManager::spawn_sweeper`].
    pub fn lockout(&self) -> &Arc<LockoutManager> {
        &self.lockout
    }

    pub fn passwords(&self) -> &PasswordManager {
        &self.passwords
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // API keys
    // -----------------------------------------------------------------------

    /// Resolve a plaintext API key to its tenant, user and key record.
    ///
    /// Unknown, revoked and expired keys all fail with the same
    /// [`AuthError::InvalidCredentials`]. The key's last-used timestamp
    /// is updated in a detached task; failures there are only logged.
    pub async fn validate_api_key(&self, raw_key: &str) -> Result<ApiKeyIdentity, AuthError> {
        if raw_key.is_empty() {
            debug!("API key validation failed: empty key");
            return Err(AuthError::MissingApiKey);
        }
        let key_prefix = api_key::key_prefix(raw_key);

        let key = match self.keys.get_by_hash(&api_key::hash_api_key(raw_key)).await {
            Ok(key) => key,
            Err(e) if e.is_not_found() => {
                debug!(key_prefix, "API key validation failed: key not found");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::store("look up API key", e)),
        };

        if !key.is_active {
            debug!(key_id = %key.id, "API key validation failed: key revoked");
            return Err(AuthError::InvalidCredentials);
        }
        if key.is_expired() {
            debug!(
                key_id = %key.id,
                expired_at = ?key.expires_at,
                "API key validation failed: key expired"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let tenant = match self.tenants.get_by_id(key.tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) if e.is_not_found() => {
                error!(
                    key_id = %key.id,
                    tenant_id = %key.tenant_id,
                    "API key validation failed: tenant not found"
                );
                return Err(AuthError::Unauthorized);
            }
            Err(e) => return Err(AuthError::store("load tenant", e)),
        };
        if !tenant.is_active {
            warn!(tenant_id = %tenant.id, "API key validation failed: tenant inactive");
            return Err(AuthError::Unauthorized);
        }

        let user = match key.user_id {
            None => None,
            Some(user_id) => match self.users.get_by_id(user_id).await {
                Ok(user) if !user.is_active => {
                    warn!(user_id = %user.id, "API key validation failed: user inactive");
                    return Err(AuthError::Unauthorized);
                }
                Ok(user) => Some(user),
                Err(e) if e.is_not_found() => {
                    warn!(key_id = %key.id, %user_id, "API key owner not found");
                    None
                }
                Err(e) => return Err(AuthError::store("load user", e)),
            },
        };

        self.touch_in_background(key.id);

        debug!(key_id = %key.id, tenant_id = %tenant.id, "API key validated");
        Ok(ApiKeyIdentity {
            tenant,
            user,
            api_key: key,
        })
    }

    fn touch_in_background(&self, key_id: Uuid) {
        let keys = Arc::clone(&self.keys);
        tokio::spawn(async move {
            if let Err(e) = keys.touch_last_used(key_id).await {
                warn!(%key_id, error = %e, "failed to update API key last used");
            }
        });
    }

    /// [`validate_api_key`](Self::validate_api_key) plus a scope check.
    pub async fn authenticate_api_key(
        &self,
        raw_key: &str,
        scope: &str,
    ) -> Result<ApiKeyIdentity, AuthError> {
        let identity = self.validate_api_key(raw_key).await?;
        if !identity.api_key.has_scope(scope) {
            debug!(key_id = %identity.api_key.id, scope, "API key lacks required scope");
            return Err(AuthError::InvalidScope {
                scope: scope.to_string(),
            });
        }
        Ok(identity)
    }

    /// Issue a new key for an active tenant.
    ///
    /// Empty `scopes` grant full access. Fails with
    /// [`AuthError::KeyLimitReached`] once the tenant holds
    /// `max_keys_per_tenant` active keys.
    pub async fn create_api_key(
        &self,
        tenant_id: Uuid,
        user_id: Option<Uuid>,
        label: &str,
        scopes: Vec<String>,
        expires_in: Option<Duration>,
    ) -> Result<GeneratedApiKey, AuthError> {
        let tenant = self
            .tenants
            .get_by_id(tenant_id)
            .await
            .map_err(|e| AuthError::store("load tenant", e))?;
        if !tenant.is_active {
            return Err(AuthError::Unauthorized);
        }

        if let Some(user_id) = user_id {
            let owner = self
                .users
                .get_by_id(user_id)
                .await
                .map_err(|e| AuthError::store("load user", e))?;
            if owner.tenant_id != tenant_id {
                return Err(AuthError::Validation(
                    "API key owner belongs to another tenant".into(),
                ));
            }
        }

        let limit = self.config.max_keys_per_tenant;
        if limit > 0 {
            let active = self
                .keys
                .list_by_tenant(tenant_id)
                .await
                .map_err(|e| AuthError::store("list existing keys", e))?
                .iter()
                .filter(|k| k.is_active)
                .count();
            if active >= limit {
                warn!(%tenant_id, limit, "API key limit reached");
                return Err(AuthError::KeyLimitReached { limit });
            }
        }

        let expires_at = expires_in.map(expiry_from_now).transpose()?;

        let generated = api_key::generate_api_key(
            KeyEnvironment::Live,
            tenant_id,
            user_id,
            label,
            scopes,
            expires_at,
        )?;
        let stored = self
            .keys
            .create(generated.api_key)
            .await
            .map_err(|e| AuthError::store("store API key", e))?;

        info!(
            key_id = %stored.id,
            %tenant_id,
            key_prefix = %stored.key_prefix,
            label,
            "API key created"
        );
        Ok(GeneratedApiKey {
            raw_key: generated.raw_key,
            api_key: stored,
        })
    }

    /// Permanently deactivate a key.
    pub async fn revoke_api_key(&self, key_id: Uuid) -> Result<(), AuthError> {
        self.keys
            .revoke(key_id)
            .await
            .map_err(|e| AuthError::store("revoke API key", e))?;
        info!(%key_id, "API key revoked");
        Ok(())
    }

    pub async fn list_api_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, AuthError> {
        self.keys
            .list_by_tenant(tenant_id)
            .await
            .map_err(|e| AuthError::store("list API keys", e))
    }

    // -----------------------------------------------------------------------
    // Tenants
    // -----------------------------------------------------------------------

    /// Create a tenant together with its first admin user and a
    /// full-access live API key.
    ///
    /// If a later step fails, records created by earlier steps are
    /// removed again on a best-effort basis.
    pub async fn create_tenant(
        &self,
        name: &str,
        admin_email: &str,
        admin_name: &str,
    ) -> Result<TenantBootstrap, AuthError> {
        let admin_email = normalize_email(admin_email);
        if name.trim().is_empty() {
            return Err(AuthError::Validation("tenant name is required".into()));
        }
        if admin_email.is_empty() {
            return Err(AuthError::Validation("admin email is required".into()));
        }

        let expires_at = self
            .config
            .default_key_expiry_secs
            .map(|secs| expiry_from_now(Duration::from_secs(secs)))
            .transpose()?;

        info!(name, admin_email = %admin_email, "creating tenant");

        // 1. Tenant.
        let tenant = self
            .tenants
            .create(CreateTenant {
                name: name.trim().to_string(),
                slug: None,
                plan: self.config.default_plan,
                is_active: true,
            })
            .await
            .map_err(|e| {
                error!(name, error = %e, "failed to create tenant");
                AuthError::store("create tenant", e)
            })?;

        // 2. Admin user.
        let admin = match self
            .users
            .create(CreateUser {
                tenant_id: tenant.id,
                email: admin_email.clone(),
                name: admin_name.to_string(),
                password_hash: String::new(),
                role: ADMIN_ROLE.to_string(),
                roles: vec![],
                is_active: true,
                email_verified: true,
                verification_token: None,
            })
            .await
        {
            Ok(user) => user,
            Err(e) => {
                error!(
                    tenant_id = %tenant.id,
                    email = %admin_email,
                    error = %e,
                    "failed to create admin user"
                );
                self.discard_tenant(tenant.id, None).await;
                return Err(AuthError::store("create admin user", e));
            }
        };

        // 3. Bootstrap key.
        let generated = match api_key::generate_api_key(
            KeyEnvironment::Live,
            tenant.id,
            Some(admin.id),
            BOOTSTRAP_KEY_LABEL,
            vec![WILDCARD_SCOPE.to_string()],
            expires_at,
        ) {
            Ok(generated) => generated,
            Err(e) => {
                error!(tenant_id = %tenant.id, error = %e, "failed to generate API key");
                self.discard_tenant(tenant.id, Some(admin.id)).await;
                return Err(e);
            }
        };
        let api_key = match self.keys.create(generated.api_key).await {
            Ok(key) => key,
            Err(e) => {
                error!(tenant_id = %tenant.id, error = %e, "failed to store API key");
                self.discard_tenant(tenant.id, Some(admin.id)).await;
                return Err(AuthError::store("store API key", e));
            }
        };

        info!(
            tenant_id = %tenant.id,
            user_id = %admin.id,
            key_id = %api_key.id,
            "tenant created"
        );
        Ok(TenantBootstrap {
            tenant,
            admin,
            raw_key: generated.raw_key,
            api_key,
        })
    }

    async fn discard_tenant(&self, tenant_id: Uuid, admin_id: Option<Uuid>) {
        if let Some(admin_id) = admin_id {
            if let Err(e) = self.users.delete(admin_id).await {
                warn!(user_id = %admin_id, error = %e, "failed to roll back admin user");
            }
        }
        if let Err(e) = self.tenants.delete(tenant_id).await {
            warn!(%tenant_id, error = %e, "failed to roll back tenant");
        }
    }

    pub async fn get_tenant(&self, id: Uuid) -> Result<Tenant, AuthError> {
        self.tenants
            .get_by_id(id)
            .await
            .map_err(|e| AuthError::store("load tenant", e))
    }

    pub async fn update_tenant(&self, id: Uuid, input: UpdateTenant) -> Result<Tenant, AuthError> {
        let tenant = self
            .tenants
            .update(id, input)
            .await
            .map_err(|e| AuthError::store("update tenant", e))?;
        info!(tenant_id = %id, "tenant updated");
        Ok(tenant)
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, AuthError> {
        self.tenants
            .list()
            .await
            .map_err(|e| AuthError::store("list tenants", e))
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Create a password user in an active tenant.
    ///
    /// With `require_email_verification` the user starts unverified and
    /// carries a verification token to be redeemed through
    /// [`verify_email`](Self::verify_email).
    pub async fn register_user(&self, input: NewUser) -> Result<User, AuthError> {
        validate_password(&input.password, self.config.password_strength)?;

        let tenant = self.get_tenant(input.tenant_id).await?;
        if !tenant.is_active {
            return Err(AuthError::Unauthorized);
        }

        let password_hash = self.passwords.hash(&input.password)?;
        let verification_token = if self.config.require_email_verification {
            Some(random_hex(VERIFICATION_TOKEN_BYTES)?)
        } else {
            None
        };

        let user = self
            .users
            .create(CreateUser {
                tenant_id: tenant.id,
                email: normalize_email(&input.email),
                name: input.name,
                password_hash,
                role: input.role,
                roles: input.roles,
                is_active: true,
                email_verified: verification_token.is_none(),
                verification_token,
            })
            .await
            .map_err(|e| AuthError::store("create user", e))?;

        info!(user_id = %user.id, tenant_id = %tenant.id, "user registered");
        Ok(user)
    }

    /// Redeem an email verification token.
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::VerificationTokenInvalid);
        }
        let user = match self.users.get_by_verification_token(token).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::VerificationTokenInvalid),
            Err(e) => return Err(AuthError::store("look up verification token", e)),
        };

        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    email_verified: Some(true),
                    verification_token: Some(None),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AuthError::store("verify email", e))?;
        info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await
            .map_err(|e| AuthError::store("load user", e))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.users
            .get_by_email(&normalize_email(email))
            .await
            .map_err(|e| AuthError::store("load user", e))
    }

    pub async fn update_user(&self, id: Uuid, mut input: UpdateUser) -> Result<User, AuthError> {
        if let Some(email) = input.email.as_mut() {
            *email = normalize_email(email);
            if email.is_empty() {
                return Err(AuthError::Validation("user email is required".into()));
            }
        }
        self.users
            .update(id, input)
            .await
            .map_err(|e| AuthError::store("update user", e))
    }

    pub async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>, AuthError> {
        self.users
            .list_by_tenant(tenant_id)
            .await
            .map_err(|e| AuthError::store("list users", e))
    }

    pub async fn deactivate_user(&self, id: Uuid) -> Result<User, AuthError> {
        let user = self
            .users
            .update(
                id,
                UpdateUser {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AuthError::store("deactivate user", e))?;
        info!(user_id = %id, "user deactivated");
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Login & sessions
    // -----------------------------------------------------------------------

    /// Authenticate with email and password and issue a session token.
    ///
    /// Failed attempts count toward the identity's lockout; the error
    /// reports how many attempts remain.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".into(),
            ));
        }

        // 1. Refuse locked identities before touching the store.
        if self.lockout.is_locked(&email) {
            let info = self.lockout.lockout_info(&email);
            warn!(email = %email, locked_until = ?info.locked_until, "login blocked by lockout");
            return Err(AuthError::AccountLocked {
                locked_until: info.locked_until,
            });
        }

        // 2. Look up user and verify password.
        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                self.passwords.verify_dummy(password);
                return Err(self.login_failure(&email));
            }
            Err(e) => return Err(AuthError::store("load user", e)),
        };
        if user.password_hash.is_empty() {
            self.passwords.verify_dummy(password);
            return Err(self.login_failure(&email));
        }
        if !self.passwords.verify(password, &user.password_hash)? {
            return Err(self.login_failure(&email));
        }

        // 3. Account status.
        if !user.is_active {
            warn!(user_id = %user.id, "login rejected: user inactive");
            return Err(AuthError::Unauthorized);
        }
        let tenant = self.get_tenant(user.tenant_id).await?;
        if !tenant.is_active {
            warn!(tenant_id = %tenant.id, "login rejected: tenant inactive");
            return Err(AuthError::Unauthorized);
        }
        if self.config.require_email_verification && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        // 4. Best-effort bookkeeping.
        if self.passwords.needs_rehash(&user.password_hash) {
            match self.passwords.hash(password) {
                Ok(hash) => {
                    if let Err(e) = self.users.update_password(user.id, &hash).await {
                        warn!(user_id = %user.id, error = %e, "failed to upgrade password hash");
                    }
                }
                Err(e) => warn!(user_id = %user.id, error = %e, "failed to rehash password"),
            }
        }
        if let Err(e) = self.users.update_last_login(user.id).await {
            warn!(user_id = %user.id, error = %e, "failed to update last login");
        }
        self.lockout.record_success(&email);

        // 5. Session.
        let (token, claims) = self.sessions.issue(&user, &tenant)?;
        info!(user_id = %user.id, tenant_id = %tenant.id, "user logged in");

        Ok(LoginOutput {
            token,
            claims,
            user,
            tenant,
        })
    }

    fn login_failure(&self, email: &str) -> AuthError {
        let outcome = self.lockout.record_failure(email);
        if outcome.locked {
            return AuthError::AccountLocked {
                locked_until: self.lockout.lockout_info(email).locked_until,
            };
        }
        debug!(remaining = outcome.remaining, "login failed");
        AuthError::LoginFailed {
            remaining_attempts: outcome.remaining,
        }
    }

    pub fn parse_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.sessions.parse_token(token)
    }

    pub fn refresh_session(&self, token: &str) -> Result<String, AuthError> {
        self.sessions.refresh_token(token)
    }

    /// Parse a session token and load the user and tenant it names,
    /// both of which must still be active.
    pub async fn resolve_session(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        let claims = self.sessions.parse_token(token)?;
        let user_id = Uuid::parse_str(&claims.user_id)
            .map_err(|_| AuthError::TokenInvalid("malformed user_id".into()))?;
        let tenant_id = Uuid::parse_str(&claims.tenant_id)
            .map_err(|_| AuthError::TokenInvalid("malformed tenant_id".into()))?;

        let user = self.load_for_session(self.users.get_by_id(user_id).await, "load user")?;
        if !user.is_active || user.tenant_id != tenant_id {
            return Err(AuthError::Unauthorized);
        }
        let tenant =
            self.load_for_session(self.tenants.get_by_id(tenant_id).await, "load tenant")?;
        if !tenant.is_active {
            return Err(AuthError::Unauthorized);
        }

        Ok(SessionIdentity {
            claims,
            user,
            tenant,
        })
    }

    fn load_for_session<V>(
        &self,
        result: Result<V, OffgridError>,
        context: &'static str,
    ) -> Result<V, AuthError> {
        result.map_err(|e| {
            if e.is_not_found() {
                AuthError::Unauthorized
            } else {
                AuthError::store(context, e)
            }
        })
    }

    // -----------------------------------------------------------------------
    // Passwords
    // -----------------------------------------------------------------------

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;
        if !self.passwords.verify(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password(new_password, self.config.password_strength)?;

        let hash = self.passwords.hash(new_password)?;
        self.users
            .update_password(user_id, &hash)
            .await
            .map_err(|e| AuthError::store("update password", e))?;
        info!(%user_id, "password changed");
        Ok(())
    }

    /// Issue a single-use reset token valid for one hour.
    pub async fn create_password_reset_token(
        &self,
        email: &str,
    ) -> Result<(String, User), AuthError> {
        let user = self.get_user_by_email(email).await?;
        if !user.is_active {
            return Err(AuthError::Unauthorized);
        }

        let token = random_hex(RESET_TOKEN_BYTES)?;
        let now = Utc::now();
        let mut pending = self.reset_tokens.lock();
        pending.retain(|_, r| r.expires_at > now);
        pending.insert(
            token.clone(),
            PendingReset {
                user_id: user.id,
                expires_at: now + TimeDelta::seconds(RESET_TOKEN_TTL_SECS),
            },
        );
        drop(pending);

        info!(user_id = %user.id, "password reset requested");
        Ok((token, user))
    }

    /// Redeem a reset token. The token is consumed by the first lookup,
    /// whether or not it is still valid.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::ResetTokenInvalid);
        }
        validate_password(new_password, self.config.password_strength)?;

        let entry = self
            .reset_tokens
            .lock()
            .remove(token)
            .filter(|r| Utc::now() <= r.expires_at)
            .ok_or(AuthError::ResetTokenInvalid)?;

        let hash = self.passwords.hash(new_password)?;
        self.users
            .update_password(entry.user_id, &hash)
            .await
            .map_err(|e| AuthError::store("update password", e))?;
        info!(user_id = %entry.user_id, "password reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Authorization
    // -----------------------------------------------------------------------

    /// RBAC decision for `user`. No user is [`AuthError::Unauthorized`].
    pub fn authorize(
        &self,
        user: Option<&User>,
        action: &str,
        resource: &str,
    ) -> Result<bool, AuthError> {
        let user = user.ok_or(AuthError::Unauthorized)?;
        self.authorizer.authorize(user, action, resource)
    }

    /// Like [`authorize`](Self::authorize), with denial as
    /// [`AuthError::Forbidden`].
    pub fn require_permission(
        &self,
        user: Option<&User>,
        action: &str,
        resource: &str,
    ) -> Result<(), AuthError> {
        if self.authorize(user, action, resource)? {
            return Ok(());
        }
        warn!(
            user_id = ?user.map(|u| u.id),
            action,
            resource,
            "permission denied"
        );
        Err(AuthError::Forbidden {
            action: action.to_string(),
            resource: resource.to_string(),
        })
    }
}
