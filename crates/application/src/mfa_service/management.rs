use aegis_core::{AppError, TenantId};
use aegis_domain::{MfaRecoveryCode, UserId};

use super::recovery_codes::{generate_recovery_codes, hash_single_code};
use super::*;

impl MfaService {
    /// Disables TOTP for a user. Requires password re-authentication.
    pub async fn disable_totp(&self, tenant_id: TenantId, user_id: UserId, password: &str) -> AppResult<()> {
        self.verify_current_password(tenant_id, user_id, password).await?;
        self.mfa_repository.delete_secret(user_id).await?;
        self.user_repository.set_totp_enabled(user_id, false).await
    }

    /// Regenerates recovery codes. Requires password re-authentication.
    pub async fn regenerate_recovery_codes(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        password: &str,
    ) -> AppResult<Vec<String>> {
        self.verify_current_password(tenant_id, user_id, password).await?;

        let codes = generate_recovery_codes();
        let hashed: Vec<MfaRecoveryCode> =
            codes.iter().map(|code| MfaRecoveryCode::new(hash_single_code(code))).collect();
        self.mfa_repository.replace_recovery_codes(user_id, &hashed).await?;

        Ok(codes)
    }

    async fn verify_current_password(&self, tenant_id: TenantId, user_id: UserId, password: &str) -> AppResult<()> {
        let user = self
            .user_repository
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        let valid = self.password_hasher.verify_password(password, &user.password_hash)?;
        if !valid {
            return Err(AppError::Unauthorized("incorrect password".to_owned()));
        }
        Ok(())
    }
}
