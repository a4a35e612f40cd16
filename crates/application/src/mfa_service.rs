//! MFA (TOTP) enrollment, verification, and recovery code management.
//!
//! Follows the OWASP Multifactor Authentication Cheat Sheet:
//! - TOTP codes are 6-digit, 30-second window, +/-1 step tolerance.
//! - A successfully verified time-step counter can never be accepted again,
//!   which defeats replay of an intercepted code within its own validity
//!   window (see [`aegis_domain::MfaSecret::accepts_counter`]).
//! - Recovery codes are single-use, stored hashed.
//! - Disabling MFA and regenerating recovery codes both require password
//!   re-authentication.
//! - Repeated bad codes lock out the MFA challenge itself, independent of
//!   the main login lockout, using the same ledger keyed by `"mfa:{user_id}"`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aegis_core::{AppError, AppResult};
use aegis_domain::{MfaRecoveryCode, MfaSecret, UserId};

use crate::login_attempt_service::LoginAttemptService;
use crate::user_service::{PasswordHasher, UserRepository};

/// TOTP enrollment data returned to the user for QR code display.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    /// Base32-encoded TOTP secret for manual entry.
    pub secret_base32: String,
    /// otpauth:// URI for QR code generation.
    pub otpauth_uri: String,
    /// Base64-encoded PNG rendering of the otpauth URI as a QR code.
    pub qr_png_base64: String,
    /// Single-use recovery codes (plaintext, shown once).
    pub recovery_codes: Vec<String>,
}

/// Freshly generated TOTP secret material, produced by a [`TotpProvider`].
#[derive(Debug, Clone)]
pub struct GeneratedTotpSecret {
    /// Raw secret bytes, encrypted before persistence.
    pub secret_bytes: Vec<u8>,
    /// Base32 encoding of the secret for manual authenticator entry.
    pub base32: String,
    /// otpauth:// provisioning URI.
    pub otpauth_uri: String,
    /// Base64-encoded PNG QR code of the provisioning URI.
    pub qr_png_base64: String,
}

/// Port for TOTP operations. Infrastructure provides the actual implementation.
pub trait TotpProvider: Send + Sync {
    /// Generates a new TOTP secret for an account.
    fn generate_secret(&self, email: &str) -> AppResult<GeneratedTotpSecret>;

    /// Verifies a code against a secret with +/-1 step tolerance, returning
    /// the matched time-step counter on success so the caller can enforce
    /// replay defense across the acceptance window.
    fn verify_code(&self, secret_bytes: &[u8], code: &str, now: DateTime<Utc>) -> AppResult<Option<i64>>;
}

/// Port for encrypting/decrypting TOTP secrets at rest.
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts a TOTP secret for database storage.
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>>;

    /// Decrypts a stored TOTP secret.
    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>>;
}

/// Repository port for MFA secrets and recovery codes.
#[async_trait]
pub trait MfaRepository: Send + Sync {
    async fn find_secret(&self, user_id: UserId) -> AppResult<Option<MfaSecret>>;
    async fn upsert_secret(&self, user_id: UserId, secret: &MfaSecret) -> AppResult<()>;
    async fn delete_secret(&self, user_id: UserId) -> AppResult<()>;
    async fn replace_recovery_codes(&self, user_id: UserId, codes: &[MfaRecoveryCode]) -> AppResult<()>;
    async fn find_recovery_codes(&self, user_id: UserId) -> AppResult<Vec<MfaRecoveryCode>>;
    async fn mark_recovery_code_used(&self, user_id: UserId, code_hash: &str, at: DateTime<Utc>) -> AppResult<bool>;
}

/// Builds the ledger identifier used to key MFA-challenge lockout counts,
/// kept separate from the main login lockout identifier.
#[must_use]
pub fn mfa_lockout_identifier(user_id: UserId) -> String {
    format!("mfa:{user_id}")
}

/// Application service for MFA operations.
#[derive(Clone)]
pub struct MfaService {
    mfa_repository: Arc<dyn MfaRepository>,
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    totp_provider: Arc<dyn TotpProvider>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
    lockout: LoginAttemptService,
}

impl MfaService {
    /// Creates a new MFA service.
    #[must_use]
    pub fn new(
        mfa_repository: Arc<dyn MfaRepository>,
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        totp_provider: Arc<dyn TotpProvider>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
        lockout: LoginAttemptService,
    ) -> Self {
        Self {
            mfa_repository,
            user_repository,
            password_hasher,
            totp_provider,
            secret_encryptor,
            lockout,
        }
    }
}

mod enrollment;
mod management;
mod recovery_codes;
mod verification;
