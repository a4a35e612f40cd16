//! PostgreSQL-backed password-reset token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use aegis_application::PasswordResetRepository;
use aegis_core::{AppError, AppResult};
use aegis_domain::{PasswordResetToken, UserId};

/// PostgreSQL implementation of the password-reset repository port.
#[derive(Clone)]
pub struct PostgresPasswordResetRepository {
    pool: PgPool,
}

impl PostgresPasswordResetRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PasswordResetRow {
    user_id: uuid::Uuid,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<PasswordResetRow> for PasswordResetToken {
    fn from(row: PasswordResetRow) -> Self {
        PasswordResetToken::from_parts(UserId::from_uuid(row.user_id), row.token_hash, row.issued_at, row.expires_at, row.used_at)
    }
}

#[async_trait]
impl PasswordResetRepository for PostgresPasswordResetRepository {
    async fn create(&self, token: &PasswordResetToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, issued_at, expires_at, used_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.user_id().as_uuid())
        .bind(token.token_hash())
        .bind(token.issued_at())
        .bind(token.expires_at())
        .bind(token.used_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create password reset token: {error}")))?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetRow>(
            r#"
            SELECT user_id, token_hash, issued_at, expires_at, used_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up password reset token: {error}")))?;

        Ok(row.map(PasswordResetToken::from))
    }

    async fn save(&self, token: &PasswordResetToken) -> AppResult<()> {
        sqlx::query("UPDATE password_reset_tokens SET used_at = $2 WHERE token_hash = $1")
            .bind(token.token_hash())
            .bind(token.used_at())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to save password reset token: {error}")))?;

        Ok(())
    }

    async fn count_recent_for_user(&self, user_id: UserId, since: DateTime<Utc>) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM password_reset_tokens
            WHERE user_id = $1 AND issued_at >= $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count recent password reset tokens: {error}")))?;

        Ok(count)
    }

    async fn invalidate_all_for_user(&self, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $2
            WHERE user_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to invalidate password reset tokens: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up password reset tokens: {error}")))?;

        Ok(result.rows_affected())
    }
}
