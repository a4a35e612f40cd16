//! Argon2id password hasher implementation.
//!
//! Uses OWASP-recommended Argon2id parameters: m=19456 (19 MiB), t=2, p=1.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as Argon2Verifier, PasswordVerifier, Version};
use aegis_application::PasswordHasher as PasswordHasherPort;
use aegis_core::{AppError, AppResult};

/// Argon2id password hasher with OWASP-recommended parameters.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
    /// Hash of an unguessable constant, computed once, so rejecting a
    /// lookup for a nonexistent account costs the same CPU time as a real
    /// verification.
    dummy_hash: String,
}

impl Argon2PasswordHasher {
    /// Creates a new Argon2id hasher with recommended parameters.
    #[must_use]
    pub fn new() -> Self {
        // OWASP Password Storage: Argon2id with m=19456, t=2, p=1.
        let params = Params::new(19456, 2, 1, None).unwrap_or_else(|_| Params::default());
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let dummy_hash = argon2
            .hash_password(b"aegis-dummy-password-for-timing-parity", &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_else(|_| "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_owned());

        Self { argon2, dummy_hash }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))?;

        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|error| AppError::Internal(format!("failed to parse password hash: {error}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!("password verification failed: {error}"))),
        }
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return true;
        };
        !self.argon2.params_match(&parsed_hash)
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

/// Whether a parsed hash's cost parameters match this hasher's current
/// configuration, returned as an extension method since `argon2::Argon2`
/// has no built-in comparator.
trait ParamsMatch {
    fn params_match(&self, hash: &PasswordHash<'_>) -> bool;
}

impl ParamsMatch for Argon2<'static> {
    fn params_match(&self, hash: &PasswordHash<'_>) -> bool {
        let Some(params) = hash.params.get("m").zip(hash.params.get("t")).zip(hash.params.get("p")) else {
            return false;
        };
        let ((m, t), p) = params;
        let current = self.params();
        m.decimal().ok() == Some(current.m_cost())
            && t.decimal().ok() == Some(current.t_cost())
            && p.decimal().ok() == Some(current.p_cost())
    }
}
