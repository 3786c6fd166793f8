//! Password policy and Argon2id hashing.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::config::PasswordConfig;
use crate::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 64;

const SALT_LEN: usize = 16;
const DUMMY_PASSWORD: &str = "offgrid-dummy-password";

/// Complexity requirements applied on top of the length bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    /// Length only.
    #[default]
    Basic,
    /// Length plus upper and lower case.
    Medium,
    /// Medium plus a digit and a symbol.
    Strong,
}

/// Check `password` against the policy, reporting the first unmet
/// requirement.
pub fn validate_password(password: &str, strength: PasswordStrength) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("password cannot be empty".into()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must not exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    if strength == PasswordStrength::Basic {
        return Ok(());
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    if !has_upper {
        return Err(AuthError::Validation(
            "password must contain an uppercase letter".into(),
        ));
    }
    if !has_lower {
        return Err(AuthError::Validation(
            "password must contain a lowercase letter".into(),
        ));
    }
    if strength == PasswordStrength::Medium {
        return Ok(());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err(AuthError::Validation("password must contain a digit".into()));
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        return Err(AuthError::Validation(
            "password must contain a special character".into(),
        ));
    }
    Ok(())
}

/// Argon2id hasher bound to one set of cost parameters and an optional
/// pepper.
///
/// The pepper is prepended to the plaintext before hashing and
/// verification, so it must stay stable for the lifetime of the stored
/// hashes.
#[derive(Clone)]
pub struct PasswordManager {
    argon2: Argon2<'static>,
    pepper: Option<String>,
    /// Hash of [`DUMMY_PASSWORD`] under the configured parameters.
    dummy_hash: String,
}

impl std::fmt::Debug for PasswordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordManager")
            .field("params", self.argon2.params())
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PasswordManager {
    pub fn new(config: &PasswordConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Crypto(format!("invalid argon2 parameters: {e}")))?;

        let mut manager = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            pepper: config.pepper.clone().filter(|p| !p.is_empty()),
            dummy_hash: String::new(),
        };
        manager.dummy_hash = manager.hash(DUMMY_PASSWORD)?;
        Ok(manager)
    }

    fn peppered(&self, password: &str) -> Vec<u8> {
        match &self.pepper {
            Some(p) => format!("{p}{password}").into_bytes(),
            None => password.as_bytes().to_vec(),
        }
    }

    /// Hash a plaintext password into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Validation("password cannot be empty".into()));
        }

        let mut salt_bytes = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| AuthError::KeyGeneration(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::Crypto(format!("salt encoding: {e}")))?;

        self.argon2
            .hash_password(&self.peppered(password), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// Returns `Ok(false)` on mismatch or when either input is empty,
    /// and `Err(AuthError::Crypto)` when the stored hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        if password.is_empty() || hash.is_empty() {
            return Ok(false);
        }

        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(&self.peppered(password), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }

    /// Run a full verification against a throwaway hash and discard the
    /// result, so a failed account lookup costs as much as a wrong
    /// password.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// Whether `hash` should be recomputed with the current parameters.
    ///
    /// True for hashes that are not Argon2id, cannot be parsed, or were
    /// produced with a lower cost than configured.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        let Ok(stored) = Params::try_from(&parsed) else {
            return true;
        };

        let current = self.argon2.params();
        stored.m_cost() < current.m_cost()
            || stored.t_cost() < current.t_cost()
            || stored.p_cost() < current.p_cost()
    }
}
