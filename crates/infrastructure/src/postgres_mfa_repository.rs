//! PostgreSQL-backed MFA secret and recovery-code repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use aegis_application::MfaRepository;
use aegis_core::{AppError, AppResult};
use aegis_domain::{MfaRecoveryCode, MfaSecret, UserId};

/// PostgreSQL implementation of the MFA repository port.
#[derive(Clone)]
pub struct PostgresMfaRepository {
    pool: PgPool,
}

impl PostgresMfaRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MfaSecretRow {
    secret_ciphertext: Vec<u8>,
    enabled: bool,
    highest_counter_used: Option<i64>,
    enrolled_at: DateTime<Utc>,
}

impl From<MfaSecretRow> for MfaSecret {
    fn from(row: MfaSecretRow) -> Self {
        MfaSecret::from_parts(row.secret_ciphertext, row.enabled, row.highest_counter_used, row.enrolled_at)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecoveryCodeRow {
    code_hash: String,
    used_at: Option<DateTime<Utc>>,
}

impl From<RecoveryCodeRow> for MfaRecoveryCode {
    fn from(row: RecoveryCodeRow) -> Self {
        MfaRecoveryCode::from_parts(row.code_hash, row.used_at)
    }
}

#[async_trait]
impl MfaRepository for PostgresMfaRepository {
    async fn find_secret(&self, user_id: UserId) -> AppResult<Option<MfaSecret>> {
        let row = sqlx::query_as::<_, MfaSecretRow>(
            r#"
            SELECT secret_ciphertext, enabled, highest_counter_used, enrolled_at
            FROM mfa_secrets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up MFA secret: {error}")))?;

        Ok(row.map(MfaSecret::from))
    }

    async fn upsert_secret(&self, user_id: UserId, secret: &MfaSecret) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mfa_secrets (user_id, secret_ciphertext, enabled, highest_counter_used, enrolled_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                secret_ciphertext = EXCLUDED.secret_ciphertext,
                enabled = EXCLUDED.enabled,
                highest_counter_used = EXCLUDED.highest_counter_used,
                enrolled_at = EXCLUDED.enrolled_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(secret.secret_ciphertext())
        .bind(secret.is_enabled())
        .bind(secret.highest_counter_used())
        .bind(secret.enrolled_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert MFA secret: {error}")))?;

        Ok(())
    }

    async fn delete_secret(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query("DELETE FROM mfa_secrets WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete MFA secret: {error}")))?;

        sqlx::query("DELETE FROM mfa_recovery_codes WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete recovery codes: {error}")))?;

        Ok(())
    }

    async fn replace_recovery_codes(&self, user_id: UserId, codes: &[MfaRecoveryCode]) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to start transaction: {error}")))?;

        sqlx::query("DELETE FROM mfa_recovery_codes WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clear recovery codes: {error}")))?;

        for code in codes {
            sqlx::query("INSERT INTO mfa_recovery_codes (user_id, code_hash, used_at) VALUES ($1, $2, $3)")
                .bind(user_id.as_uuid())
                .bind(code.code_hash())
                .bind(None::<DateTime<Utc>>)
                .execute(&mut *tx)
                .await
                .map_err(|error| AppError::Internal(format!("failed to insert recovery code: {error}")))?;
        }

        tx.commit().await.map_err(|error| AppError::Internal(format!("failed to commit recovery codes: {error}")))?;

        Ok(())
    }

    async fn find_recovery_codes(&self, user_id: UserId) -> AppResult<Vec<MfaRecoveryCode>> {
        let rows = sqlx::query_as::<_, RecoveryCodeRow>("SELECT code_hash, used_at FROM mfa_recovery_codes WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list recovery codes: {error}")))?;

        Ok(rows.into_iter().map(MfaRecoveryCode::from).collect())
    }

    async fn mark_recovery_code_used(&self, user_id: UserId, code_hash: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_recovery_codes
            SET used_at = $3
            WHERE user_id = $1 AND code_hash = $2 AND used_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(code_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to mark recovery code used: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
