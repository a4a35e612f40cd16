use chrono::Utc;

use aegis_core::{AppError, AppResult};
use aegis_domain::UserId;

use super::recovery_codes::hash_single_code;
use super::*;

impl MfaService {
    /// Verifies a TOTP code for an authenticated MFA challenge.
    ///
    /// Enforces the MFA-specific lockout ledger ahead of verification, and
    /// records the outcome afterward so repeated bad codes eventually lock
    /// out the challenge itself.
    pub async fn verify_totp(&self, user_id: UserId, code: &str) -> AppResult<bool> {
        let identifier = mfa_lockout_identifier(user_id);
        let now = Utc::now();
        self.lockout.check_gate(&identifier, now).await?;

        let mut secret = self
            .mfa_repository
            .find_secret(user_id)
            .await?
            .ok_or_else(|| AppError::Validation("TOTP is not enabled for this account".to_owned()))?;

        if !secret.is_enabled() {
            return Err(AppError::Validation(
                "TOTP is not enabled for this account".to_owned(),
            ));
        }

        let secret_bytes = self.secret_encryptor.decrypt(secret.secret_ciphertext())?;
        let counter = self.totp_provider.verify_code(&secret_bytes, code, now)?;

        let Some(counter) = counter.filter(|counter| secret.accepts_counter(*counter)) else {
            self.lockout.record_failure(&identifier, None, None, now).await?;
            return Ok(false);
        };

        secret.consume_counter(counter);
        self.mfa_repository.upsert_secret(user_id, &secret).await?;
        self.lockout.record_success(&identifier, None, None, now).await?;

        Ok(true)
    }

    /// Verifies a recovery code and, if valid, marks it consumed.
    ///
    /// Shares the same MFA lockout ledger as TOTP verification: recovery
    /// codes are a fallback authentication factor, not an escape hatch from
    /// brute-force protection.
    pub async fn verify_recovery_code(&self, user_id: UserId, code: &str) -> AppResult<bool> {
        let identifier = mfa_lockout_identifier(user_id);
        let now = Utc::now();
        self.lockout.check_gate(&identifier, now).await?;

        let code_hash = hash_single_code(code);
        let consumed = self.mfa_repository.mark_recovery_code_used(user_id, &code_hash, now).await?;

        if consumed {
            self.lockout.record_success(&identifier, None, None, now).await?;
        } else {
            self.lockout.record_failure(&identifier, None, None, now).await?;
        }

        Ok(consumed)
    }
}
