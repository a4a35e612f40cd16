use chrono::Utc;

use aegis_core::{AppError, TenantId};
use aegis_domain::{MfaRecoveryCode, MfaSecret, UserId};

use super::recovery_codes::{generate_recovery_codes, hash_single_code};
use super::*;

impl MfaService {
    /// Starts TOTP enrollment for a user.
    ///
    /// Stores a not-yet-confirmed [`MfaSecret`] and a fresh set of recovery
    /// codes, and returns the secret and codes for display. MFA is not
    /// enforced at login until [`MfaService::confirm_enrollment`] proves
    /// possession of the authenticator.
    pub async fn start_enrollment(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<TotpEnrollment> {
        let user = self
            .user_repository
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        if user.totp_enabled {
            return Err(AppError::Conflict(
                "TOTP is already enabled for this account".to_owned(),
            ));
        }

        let generated = self.totp_provider.generate_secret(&user.email)?;
        let encrypted_secret = self.secret_encryptor.encrypt(&generated.secret_bytes)?;

        let secret = MfaSecret::new(encrypted_secret, Utc::now());
        self.mfa_repository.upsert_secret(user_id, &secret).await?;

        let recovery_codes = generate_recovery_codes();
        let hashed_codes: Vec<MfaRecoveryCode> =
            recovery_codes.iter().map(|code| MfaRecoveryCode::new(hash_single_code(code))).collect();
        self.mfa_repository.replace_recovery_codes(user_id, &hashed_codes).await?;

        Ok(TotpEnrollment {
            secret_base32: generated.base32,
            otpauth_uri: generated.otpauth_uri,
            qr_png_base64: generated.qr_png_base64,
            recovery_codes,
        })
    }

    /// Confirms TOTP enrollment by verifying a code from the user's
    /// authenticator, then enabling MFA enforcement at login.
    pub async fn confirm_enrollment(&self, user_id: UserId, code: &str) -> AppResult<()> {
        let mut secret = self
            .mfa_repository
            .find_secret(user_id)
            .await?
            .ok_or_else(|| AppError::Validation("no TOTP enrollment in progress".to_owned()))?;

        let secret_bytes = self.secret_encryptor.decrypt(secret.secret_ciphertext())?;
        let now = Utc::now();
        let counter = self.totp_provider.verify_code(&secret_bytes, code, now)?;

        let Some(counter) = counter.filter(|counter| secret.accepts_counter(*counter)) else {
            return Err(AppError::Unauthorized("invalid TOTP code".to_owned()));
        };

        secret.consume_counter(counter);
        secret.confirm();
        self.mfa_repository.upsert_secret(user_id, &secret).await?;
        self.user_repository.set_totp_enabled(user_id, true).await
    }
}
