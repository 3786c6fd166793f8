//! Integration tests for the authentication service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use offgrid_auth::config::{
    AuthConfig, LockoutConfig, PasswordConfig, ServiceConfig, SessionConfig,
};
use offgrid_auth::rbac::{Permission, RbacAuthorizer, actions, resources};
use offgrid_auth::service::{AuthService, NewUser};
use offgrid_auth::session::SessionClaims;
use offgrid_auth::{AuthError, LockoutManager, api_key};
use offgrid_core::models::tenant::{Plan, UpdateTenant};
use offgrid_core::models::user::UpdateUser;
use offgrid_core::repository::{ApiKeyRepository, TenantRepository, UserRepository};
use offgrid_db::MemoryDb;
use offgrid_db::repository::{
    MemoryApiKeyRepository, MemoryTenantRepository, MemoryUserRepository,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const SECRET: &str = "integration-test-secret-0123456789abcdef";
const PASSWORD: &str = "correct-horse-battery";

type Service = AuthService<MemoryTenantRepository, MemoryUserRepository, MemoryApiKeyRepository>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn cheap_passwords() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
        pepper: None,
    }
}

fn test_config() -> AuthConfig {
    AuthConfig {
        session: SessionConfig {
            secret: SECRET.into(),
            ..Default::default()
        },
        password: cheap_passwords(),
        ..Default::default()
    }
}

fn service_with(db: &MemoryDb, config: AuthConfig) -> Service {
    AuthService::new(
        MemoryTenantRepository::new(db.clone()),
        MemoryUserRepository::new(db.clone()),
        MemoryApiKeyRepository::new(db.clone()),
        config,
    )
    .unwrap()
}

fn setup() -> (Service, MemoryDb) {
    init_tracing();
    let db = MemoryDb::new();
    (service_with(&db, test_config()), db)
}

async fn register(service: &Service, tenant_id: uuid::Uuid, email: &str, role: &str) {
    service
        .register_user(NewUser {
            tenant_id,
            email: email.into(),
            name: "Bob".into(),
            password: PASSWORD.into(),
            role: role.into(),
            roles: vec![],
        })
        .await
        .unwrap();
}

// -----------------------------------------------------------------------
// Tenant bootstrap & API keys
// -----------------------------------------------------------------------

#[tokio::test]
async fn tenant_bootstrap_and_key_revocation() {
    let (service, _db) = setup();

    let boot = service
        .create_tenant("Acme", "a@acme.com", "Alice")
        .await
        .unwrap();
    assert!(boot.tenant.is_active);
    assert_eq!(boot.tenant.slug, "acme");
    assert_eq!(boot.tenant.plan, Plan::Free);
    assert!(boot.admin.is_active);
    assert_eq!(boot.admin.role, "admin");
    assert_eq!(boot.admin.tenant_id, boot.tenant.id);
    assert!(!boot.raw_key.is_empty());
    assert!(boot.raw_key.starts_with("ogf_live_"));
    assert_eq!(boot.api_key.scopes, vec!["*"]);
    assert_eq!(boot.api_key.days_until_expiry(), Some(29));

    let identity = service.validate_api_key(&boot.raw_key).await.unwrap();
    assert_eq!(identity.tenant.id, boot.tenant.id);
    assert_eq!(identity.user.unwrap().role, "admin");
    assert_eq!(identity.api_key.id, boot.api_key.id);

    service.revoke_api_key(boot.api_key.id).await.unwrap();
    assert!(matches!(
        service.validate_api_key(&boot.raw_key).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn bootstrap_uses_configured_plan_and_expiry() {
    init_tracing();
    let db = MemoryDb::new();
    let service = service_with(
        &db,
        AuthConfig {
            service: ServiceConfig {
                default_plan: Plan::Enterprise,
                default_key_expiry_secs: None,
                ..Default::default()
            },
            ..test_config()
        },
    );

    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    assert_eq!(boot.tenant.plan, Plan::Enterprise);
    assert_eq!(boot.api_key.expires_at, None);
}

#[tokio::test]
async fn bootstrap_requires_name_and_email() {
    let (service, _db) = setup();
    assert!(matches!(
        service.create_tenant("  ", "a@acme.com", "Alice").await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        service.create_tenant("Acme", "", "Alice").await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn failed_bootstrap_rolls_back_tenant() {
    let (service, _db) = setup();
    service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let err = service
        .create_tenant("Other", "A@Acme.com", "Alice")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Store {
            context: "create admin user",
            ..
        }
    ));

    let tenants = service.list_tenants().await.unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].name, "Acme");
}

#[tokio::test]
async fn tenants_with_colliding_names_all_bootstrap() {
    let (service, _db) = setup();
    let names = ["株式会社", "日本", "Acme, Inc.", "Acme Inc"];
    for (i, name) in names.iter().enumerate() {
        let boot = service
            .create_tenant(name, &format!("admin{i}@example.com"), "Admin")
            .await
            .unwrap();
        assert_eq!(boot.tenant.name, *name);
        assert!(!boot.tenant.slug.is_empty());
    }

    let tenants = service.list_tenants().await.unwrap();
    assert_eq!(tenants.len(), names.len());
    let mut slugs: Vec<_> = tenants.iter().map(|t| t.slug.clone()).collect();
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), names.len());
}

#[tokio::test]
async fn out_of_range_default_expiry_is_rejected_before_any_write() {
    init_tracing();
    for secs in [u64::MAX, 1 << 60] {
        let db = MemoryDb::new();
        let mut config = test_config();
        config.service.default_key_expiry_secs = Some(secs);
        let service = service_with(&db, config);

        let err = service
            .create_tenant("Acme", "a@acme.com", "Alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(service.list_tenants().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn api_key_rejections() {
    let (service, _db) = setup();
    assert!(matches!(
        service.validate_api_key("").await,
        Err(AuthError::MissingApiKey)
    ));
    assert!(matches!(
        service.validate_api_key("ogf_live_deadbeef").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn expired_key_is_invalid() {
    let (service, db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let keys = MemoryApiKeyRepository::new(db);
    let mut key = keys.get_by_id(boot.api_key.id).await.unwrap();
    key.expires_at = Some(Utc::now() - TimeDelta::seconds(1));
    keys.update(key).await.unwrap();

    assert!(matches!(
        service.validate_api_key(&boot.raw_key).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn inactive_tenant_or_user_is_unauthorized() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    service.deactivate_user(boot.admin.id).await.unwrap();
    assert!(matches!(
        service.validate_api_key(&boot.raw_key).await,
        Err(AuthError::Unauthorized)
    ));

    service
        .update_user(
            boot.admin.id,
            UpdateUser {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service
        .update_tenant(
            boot.tenant.id,
            UpdateTenant {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        service.validate_api_key(&boot.raw_key).await,
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn missing_key_owner_is_tolerated() {
    let (service, db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    MemoryUserRepository::new(db)
        .delete(boot.admin.id)
        .await
        .unwrap();

    let identity = service.validate_api_key(&boot.raw_key).await.unwrap();
    assert!(identity.user.is_none());
    assert_eq!(identity.tenant.id, boot.tenant.id);
}

#[tokio::test]
async fn validation_touches_last_used() {
    let (service, db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    assert!(boot.api_key.last_used_at.is_none());

    service.validate_api_key(&boot.raw_key).await.unwrap();

    let keys = MemoryApiKeyRepository::new(db);
    let mut touched = false;
    for _ in 0..50 {
        if keys.get_by_id(boot.api_key.id).await.unwrap().last_used_at.is_some() {
            touched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(touched);
}

#[tokio::test]
async fn scoped_key_authentication() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let generated = service
        .create_api_key(
            boot.tenant.id,
            None,
            "reporting",
            vec!["emissions".into()],
            Some(Duration::from_secs(3600)),
        )
        .await
        .unwrap();
    assert_eq!(api_key::hash_api_key(&generated.raw_key), generated.api_key.key_hash);
    assert!(generated.api_key.expires_at.is_some());

    let identity = service
        .authenticate_api_key(&generated.raw_key, "emissions:read")
        .await
        .unwrap();
    assert!(identity.user.is_none());

    assert!(matches!(
        service.authenticate_api_key(&generated.raw_key, "billing").await,
        Err(AuthError::InvalidScope { .. })
    ));
    // Bootstrap key is full access.
    service
        .authenticate_api_key(&boot.raw_key, "billing")
        .await
        .unwrap();
}

#[tokio::test]
async fn key_limit_counts_active_keys() {
    init_tracing();
    let db = MemoryDb::new();
    let service = service_with(
        &db,
        AuthConfig {
            service: ServiceConfig {
                max_keys_per_tenant: 2,
                ..Default::default()
            },
            ..test_config()
        },
    );
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let second = service
        .create_api_key(boot.tenant.id, None, "ci", vec![], None)
        .await
        .unwrap();
    assert!(matches!(
        service.create_api_key(boot.tenant.id, None, "ci-2", vec![], None).await,
        Err(AuthError::KeyLimitReached { limit: 2 })
    ));

    service.revoke_api_key(second.api_key.id).await.unwrap();
    service
        .create_api_key(boot.tenant.id, None, "ci-2", vec![], None)
        .await
        .unwrap();
    assert_eq!(service.list_api_keys(boot.tenant.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn key_creation_requires_active_tenant() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    service
        .update_tenant(
            boot.tenant.id,
            UpdateTenant {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        service.create_api_key(boot.tenant.id, None, "ci", vec![], None).await,
        Err(AuthError::Unauthorized)
    ));
    let err = service
        .create_api_key(uuid::Uuid::new_v4(), None, "ci", vec![], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Store { ref source, .. } if source.is_not_found()));
}

#[tokio::test]
async fn key_owner_must_share_tenant() {
    let (service, _db) = setup();
    let acme = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    let other = service.create_tenant("Other", "o@other.com", "Olga").await.unwrap();

    assert!(matches!(
        service
            .create_api_key(acme.tenant.id, Some(other.admin.id), "ci", vec![], None)
            .await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn revoke_unknown_key_is_not_found() {
    let (service, _db) = setup();
    let err = service.revoke_api_key(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AuthError::Store { ref source, .. } if source.is_not_found()));
}

// -----------------------------------------------------------------------
// Login & sessions
// -----------------------------------------------------------------------

#[tokio::test]
async fn login_issues_resolvable_session() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "Bob@Acme.com ", "editor").await;

    let output = service.login("bob@acme.com", PASSWORD).await.unwrap();
    assert_eq!(output.user.email, "bob@acme.com");
    assert_eq!(output.tenant.id, boot.tenant.id);
    assert_eq!(output.claims.role, "editor");
    assert_eq!(output.claims.tenant_id, boot.tenant.id.to_string());

    let stored = service.get_user_by_email("BOB@acme.com").await.unwrap();
    assert!(stored.last_login_at.is_some());

    let identity = service.resolve_session(&output.token).await.unwrap();
    assert_eq!(identity.user.id, output.user.id);
    assert_eq!(identity.tenant.id, boot.tenant.id);

    let refreshed = service.refresh_session(&output.token).unwrap();
    assert_eq!(
        service.parse_session(&refreshed).unwrap().user_id,
        output.claims.user_id
    );
}

#[tokio::test]
async fn repeated_login_failures_lock_the_account() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;

    for expected in [4, 3, 2, 1] {
        match service.login("bob@acme.com", "wrong-password").await {
            Err(AuthError::LoginFailed { remaining_attempts }) => {
                assert_eq!(remaining_attempts, expected)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert!(matches!(
        service.login("bob@acme.com", "wrong-password").await,
        Err(AuthError::AccountLocked {
            locked_until: Some(_)
        })
    ));

    // Even the correct password is refused while locked.
    assert!(matches!(
        service.login("BOB@acme.com", PASSWORD).await,
        Err(AuthError::AccountLocked { .. })
    ));

    service.lockout().record_success("bob@acme.com");
    service.login("bob@acme.com", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn unknown_email_counts_toward_lockout() {
    let (service, _db) = setup();
    assert!(matches!(
        service.login("ghost@acme.com", PASSWORD).await,
        Err(AuthError::LoginFailed {
            remaining_attempts: 4
        })
    ));
    assert_eq!(service.lockout().lockout_info("ghost@acme.com").attempts, 1);
}

#[tokio::test]
async fn successful_login_clears_failures() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;

    let _ = service.login("bob@acme.com", "wrong-password").await;
    let _ = service.login("bob@acme.com", "wrong-password").await;
    service.login("bob@acme.com", PASSWORD).await.unwrap();
    assert_eq!(service.lockout().lockout_info("bob@acme.com").attempts, 0);
}

#[tokio::test]
async fn login_requires_active_user_and_tenant() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;
    let bob = service.get_user_by_email("bob@acme.com").await.unwrap();

    let session = service.login("bob@acme.com", PASSWORD).await.unwrap();

    service.deactivate_user(bob.id).await.unwrap();
    assert!(matches!(
        service.login("bob@acme.com", PASSWORD).await,
        Err(AuthError::Unauthorized)
    ));
    // Still a valid signature, but the identity no longer resolves.
    service.parse_session(&session.token).unwrap();
    assert!(matches!(
        service.resolve_session(&session.token).await,
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn admin_without_password_cannot_log_in() {
    let (service, _db) = setup();
    service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    assert!(matches!(
        service.login("a@acme.com", PASSWORD).await,
        Err(AuthError::LoginFailed { .. })
    ));
}

#[tokio::test]
async fn email_verification_flow() {
    init_tracing();
    let db = MemoryDb::new();
    let service = service_with(
        &db,
        AuthConfig {
            service: ServiceConfig {
                require_email_verification: true,
                ..Default::default()
            },
            ..test_config()
        },
    );
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    let user = service
        .register_user(NewUser {
            tenant_id: boot.tenant.id,
            email: "bob@acme.com".into(),
            name: "Bob".into(),
            password: PASSWORD.into(),
            role: String::new(),
            roles: vec![],
        })
        .await
        .unwrap();
    assert!(!user.email_verified);
    let token = user.verification_token.clone().unwrap();
    assert_eq!(token.len(), 48);

    assert!(matches!(
        service.login("bob@acme.com", PASSWORD).await,
        Err(AuthError::EmailNotVerified)
    ));

    let verified = service.verify_email(&token).await.unwrap();
    assert!(verified.email_verified);
    assert!(verified.verification_token.is_none());
    service.login("bob@acme.com", PASSWORD).await.unwrap();

    assert!(matches!(
        service.verify_email(&token).await,
        Err(AuthError::VerificationTokenInvalid)
    ));
}

#[tokio::test]
async fn registration_enforces_password_policy() {
    init_tracing();
    let db = MemoryDb::new();
    let service = service_with(
        &db,
        AuthConfig {
            service: ServiceConfig {
                password_strength: offgrid_auth::password::PasswordStrength::Strong,
                ..Default::default()
            },
            ..test_config()
        },
    );
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let err = service
        .register_user(NewUser {
            tenant_id: boot.tenant.id,
            email: "bob@acme.com".into(),
            name: "Bob".into(),
            password: PASSWORD.into(),
            role: String::new(),
            roles: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    assert!(service.get_user_by_email("bob@acme.com").await.is_err());
}

#[tokio::test]
async fn weak_hashes_are_upgraded_on_login() {
    init_tracing();
    let db = MemoryDb::new();
    let weak = service_with(&db, test_config());
    let strong = service_with(
        &db,
        AuthConfig {
            password: PasswordConfig {
                memory_kib: 16,
                iterations: 2,
                ..cheap_passwords()
            },
            ..test_config()
        },
    );

    let boot = weak.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&weak, boot.tenant.id, "bob@acme.com", "").await;
    let before = weak.get_user_by_email("bob@acme.com").await.unwrap();
    assert!(strong.passwords().needs_rehash(&before.password_hash));

    strong.login("bob@acme.com", PASSWORD).await.unwrap();

    let after = strong.get_user_by_email("bob@acme.com").await.unwrap();
    assert_ne!(after.password_hash, before.password_hash);
    assert!(!strong.passwords().needs_rehash(&after.password_hash));
    strong.login("bob@acme.com", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn session_expires_after_ttl() {
    let (service, _db) = setup();
    let now = Utc::now().timestamp();
    let token = service
        .sessions()
        .create_token_with_claims(SessionClaims {
            user_id: "u".into(),
            tenant_id: "t".into(),
            iat: Some(now),
            exp: Some(now + 1),
            ..Default::default()
        })
        .unwrap();

    service.parse_session(&token).unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(matches!(
        service.parse_session(&token),
        Err(AuthError::TokenExpired)
    ));
}

// -----------------------------------------------------------------------
// Passwords
// -----------------------------------------------------------------------

#[tokio::test]
async fn password_reset_is_single_use() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;

    let (token, user) = service
        .create_password_reset_token("bob@acme.com")
        .await
        .unwrap();
    assert_eq!(user.email, "bob@acme.com");
    assert_eq!(token.len(), 48);

    service
        .reset_password(&token, "brand-new-password")
        .await
        .unwrap();
    assert!(matches!(
        service.reset_password(&token, "another-password").await,
        Err(AuthError::ResetTokenInvalid)
    ));
    assert!(matches!(
        service.reset_password("", "another-password").await,
        Err(AuthError::ResetTokenInvalid)
    ));

    service
        .login("bob@acme.com", "brand-new-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_requires_active_user() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    service.deactivate_user(boot.admin.id).await.unwrap();

    assert!(matches!(
        service.create_password_reset_token("a@acme.com").await,
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn change_password_checks_current() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;
    let bob = service.get_user_by_email("bob@acme.com").await.unwrap();

    assert!(matches!(
        service
            .change_password(bob.id, "wrong-password", "brand-new-password")
            .await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        service.change_password(bob.id, PASSWORD, "short").await,
        Err(AuthError::Validation(_))
    ));

    service
        .change_password(bob.id, PASSWORD, "brand-new-password")
        .await
        .unwrap();
    service
        .login("bob@acme.com", "brand-new-password")
        .await
        .unwrap();
}

// -----------------------------------------------------------------------
// Authorization
// -----------------------------------------------------------------------

#[tokio::test]
async fn require_permission_outcomes() {
    let (service, _db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;
    let viewer = service.get_user_by_email("bob@acme.com").await.unwrap();
    assert_eq!(viewer.role, "viewer");

    assert!(matches!(
        service.require_permission(None, actions::READ, resources::EMISSIONS),
        Err(AuthError::Unauthorized)
    ));
    service
        .require_permission(Some(&viewer), actions::READ, resources::EMISSIONS)
        .unwrap();
    assert!(matches!(
        service.require_permission(Some(&viewer), actions::DELETE, resources::EMISSIONS),
        Err(AuthError::Forbidden { .. })
    ));
    service
        .require_permission(Some(&boot.admin), actions::DELETE, resources::BILLING)
        .unwrap();
}

#[tokio::test]
async fn injected_authorizer_replaces_defaults() {
    init_tracing();
    let db = MemoryDb::new();
    let mut roles = HashMap::new();
    roles.insert(
        "viewer".to_string(),
        vec![Permission::new(actions::READ, resources::BILLING)],
    );
    let authorizer = Arc::new(RbacAuthorizer::with_roles(roles));
    let service = service_with(&db, test_config()).with_authorizer(authorizer);

    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();
    register(&service, boot.tenant.id, "bob@acme.com", "").await;
    let viewer = service.get_user_by_email("bob@acme.com").await.unwrap();

    assert!(service.authorize(Some(&viewer), actions::READ, resources::BILLING).unwrap());
    assert!(!service.authorize(Some(&viewer), actions::READ, resources::EMISSIONS).unwrap());
    // No admin role in the injected table.
    assert!(!service.authorize(Some(&boot.admin), actions::READ, resources::BILLING).unwrap());
}

// -----------------------------------------------------------------------
// Lockout
// -----------------------------------------------------------------------

#[test]
fn concurrent_failures_cross_threshold_once() {
    let lockout = LockoutManager::new(&LockoutConfig::default());

    let outcomes: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..32)
            .map(|_| s.spawn(|| lockout.record_failure("race@acme.com")))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut unlocked: Vec<u32> = outcomes
        .iter()
        .filter(|o| !o.locked)
        .map(|o| o.remaining)
        .collect();
    unlocked.sort();
    assert_eq!(unlocked, vec![1, 2, 3, 4]);
    assert!(lockout.is_locked("race@acme.com"));
    assert_eq!(lockout.lockout_info("race@acme.com").attempts, 32);
}

#[tokio::test]
async fn sweeper_purges_and_stops_on_cancel() {
    init_tracing();
    let lockout = Arc::new(LockoutManager::new(&LockoutConfig {
        window_secs: 1,
        cleanup_interval_secs: 1,
        ..Default::default()
    }));
    lockout.record_failure("a@acme.com");

    let cancel = CancellationToken::new();
    let handle = lockout.spawn_sweeper(cancel.clone());

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(lockout.lockout_info("a@acme.com").attempts, 0);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn sweeper_stops_when_manager_dropped() {
    let lockout = Arc::new(LockoutManager::new(&LockoutConfig {
        cleanup_interval_secs: 1,
        ..Default::default()
    }));
    let handle = lockout.spawn_sweeper(CancellationToken::new());
    drop(lockout);

    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn repository_contract_is_reachable_through_service() {
    let (service, db) = setup();
    let boot = service.create_tenant("Acme", "a@acme.com", "Alice").await.unwrap();

    let tenants = MemoryTenantRepository::new(db.clone());
    assert_eq!(tenants.get_by_slug("acme").await.unwrap().id, boot.tenant.id);
    let users = MemoryUserRepository::new(db);
    assert_eq!(users.list_by_tenant(boot.tenant.id).await.unwrap().len(), 1);
    assert_eq!(service.list_users(boot.tenant.id).await.unwrap().len(), 1);
    assert_eq!(service.get_user(boot.admin.id).await.unwrap().email, "a@acme.com");
    assert_eq!(service.get_tenant(boot.tenant.id).await.unwrap().name, "Acme");
}
