//! API key generation and hashing.
//!
//! Keys have the form `ogf_{env}_{64 lowercase hex}`. Only the SHA-256
//! of the full key is stored, together with its first
//! [`KEY_PREFIX_LEN`] characters for display.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use offgrid_core::models::api_key::{ApiKey, WILDCARD_SCOPE};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AuthError;

pub const API_KEY_PREFIX: &str = "ogf_";

/// Bytes of OS randomness per key (256 bits).
pub const API_KEY_RANDOM_BYTES: usize = 32;

/// Number of leading characters kept as the display prefix.
pub const KEY_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEnvironment {
    Live,
    Test,
    Dev,
}

impl KeyEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyEnvironment::Live => "live",
            KeyEnvironment::Test => "test",
            KeyEnvironment::Dev => "dev",
        }
    }
}

impl fmt::Display for KeyEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyEnvironment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(KeyEnvironment::Live),
            "test" => Ok(KeyEnvironment::Test),
            "dev" => Ok(KeyEnvironment::Dev),
            other => Err(AuthError::Validation(format!(
                "invalid environment {other:?}, must be live/test/dev"
            ))),
        }
    }
}

/// A freshly generated key. `raw_key` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub raw_key: String,
    pub api_key: ApiKey,
}

/// Generate a new API key record and its plaintext.
///
/// Empty `scopes` default to full access. Randomness comes from the OS;
/// if it is unavailable the call fails with [`AuthError::KeyGeneration`].
pub fn generate_api_key(
    env: KeyEnvironment,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
    label: &str,
    scopes: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<GeneratedApiKey, AuthError> {
    if tenant_id.is_nil() {
        return Err(AuthError::Validation(
            "tenant ID is required for API key".into(),
        ));
    }
    let scopes = if scopes.is_empty() {
        vec![WILDCARD_SCOPE.to_string()]
    } else {
        scopes
    };

    let mut random = [0u8; API_KEY_RANDOM_BYTES];
    OsRng
        .try_fill_bytes(&mut random)
        .map_err(|e| AuthError::KeyGeneration(e.to_string()))?;

    let raw_key = format!("{API_KEY_PREFIX}{env}_{}", hex::encode(random));
    let api_key = ApiKey {
        id: Uuid::now_v7(),
        key_hash: hash_api_key(&raw_key),
        key_prefix: key_prefix(&raw_key).to_string(),
        label: label.to_string(),
        tenant_id,
        user_id,
        scopes,
        expires_at,
        last_used_at: None,
        is_active: true,
        created_at: Utc::now(),
    };

    Ok(GeneratedApiKey { raw_key, api_key })
}

/// SHA-256 of a plaintext key, hex-encoded. This is the stored lookup value.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Environment encoded in a key, or `None` if the key is malformed.
pub fn parse_api_key_env(raw: &str) -> Option<KeyEnvironment> {
    let rest = raw.strip_prefix(API_KEY_PREFIX)?;
    let (env, _) = rest.split_once('_')?;
    env.parse().ok()
}

/// Display prefix of a key (the whole key if shorter).
pub fn key_prefix(raw: &str) -> &str {
    raw.get(..KEY_PREFIX_LEN).unwrap_or(raw)
}
