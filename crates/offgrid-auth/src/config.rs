//! Authentication configuration.
//!
//! All sections deserialize with `#[serde(default)]`, so a partial
//! document (or none at all) yields a working configuration apart from
//! the session secret, which has no usable default.

use offgrid_core::models::tenant::Plan;
use serde::Deserialize;

use crate::password::PasswordStrength;

/// Top-level configuration for [`AuthService`](crate::AuthService).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub service: ServiceConfig,
    pub lockout: LockoutConfig,
    pub session: SessionConfig,
    pub password: PasswordConfig,
}

/// Tenant bootstrap and API key policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of active API keys per tenant (0 = unlimited).
    pub max_keys_per_tenant: usize,
    /// Plan assigned to newly created tenants.
    pub default_plan: Plan,
    /// Lifetime of the bootstrap API key in seconds (`None` = never expires).
    pub default_key_expiry_secs: Option<u64>,
    /// New self-registered users must verify their email before login.
    pub require_email_verification: bool,
    /// Policy applied to passwords set through the service.
    pub password_strength: PasswordStrength,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_keys_per_tenant: 10,
            default_plan: Plan::Free,
            default_key_expiry_secs: Some(30 * 24 * 60 * 60),
            require_email_verification: false,
            password_strength: PasswordStrength::Basic,
        }
    }
}

/// Failed-login lockout. Zero values fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Failures inside one window before the identity locks (default: 5).
    pub max_attempts: u32,
    /// How long a lock lasts in seconds (default: 900 = 15 minutes).
    pub lockout_period_secs: u64,
    /// Sliding window in which failures accumulate (default: 300 = 5 minutes).
    pub window_secs: u64,
    /// Interval between background sweeps (default: 300 = 5 minutes).
    pub cleanup_interval_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_period_secs: 900,
            window_secs: 300,
            cleanup_interval_secs: 300,
        }
    }
}

/// Signed session tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret, at least 32 bytes.
    pub secret: String,
    /// Token lifetime in seconds (default: 86_400 = 24 hours). Values
    /// outside the supported range are ignored.
    pub ttl_secs: u64,
    /// `iss` claim.
    pub issuer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 86_400,
            issuer: "offgridflow".into(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19_456 = 19 MiB).
    pub memory_kib: u32,
    /// Time cost (default: 2).
    pub iterations: u32,
    /// Degree of parallelism (default: 1).
    pub parallelism: u32,
    /// Optional server-side secret prepended to passwords.
    pub pepper: Option<String>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP recommended: m=19456 (19 MiB), t=2, p=1
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
            pepper: None,
        }
    }
}
