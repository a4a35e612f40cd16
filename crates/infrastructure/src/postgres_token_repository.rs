//! PostgreSQL-backed refresh-token and revocation-blacklist repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use aegis_application::{RevokedTokenRepository, TokenRepository};
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{RefreshToken, RevokedToken, SessionId, TokenId, UserId};

/// PostgreSQL implementation of the refresh-token repository port.
#[derive(Clone)]
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    jti: Uuid,
    session_id: Uuid,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    replaced_by: Option<Uuid>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken::from_parts(
            TokenId::from_uuid(row.jti),
            SessionId::from_uuid(row.session_id),
            row.token_hash,
            row.issued_at,
            row.expires_at,
            row.used_at,
            row.replaced_by.map(TokenId::from_uuid),
        )
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn create(&self, token: &RefreshToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (jti, session_id, token_hash, issued_at, expires_at, used_at, replaced_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.jti().as_uuid())
        .bind(token.session_id().as_uuid())
        .bind(token.token_hash())
        .bind(token.issued_at())
        .bind(token.expires_at())
        .bind(token.used_at())
        .bind(token.replaced_by().map(|jti| jti.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create refresh token: {error}")))?;

        Ok(())
    }

    async fn find_by_jti(&self, jti: TokenId) -> AppResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT jti, session_id, token_hash, issued_at, expires_at, used_at, replaced_by
            FROM refresh_tokens
            WHERE jti = $1
            "#,
        )
        .bind(jti.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up refresh token: {error}")))?;

        Ok(row.map(RefreshToken::from))
    }

    async fn save(&self, token: &RefreshToken) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET used_at = $2, replaced_by = $3
            WHERE jti = $1
            "#,
        )
        .bind(token.jti().as_uuid())
        .bind(token.used_at())
        .bind(token.replaced_by().map(|jti| jti.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save refresh token: {error}")))?;

        Ok(())
    }

    async fn mark_all_used_for_user(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET used_at = $3
            FROM sessions
            WHERE refresh_tokens.session_id = sessions.id
              AND sessions.tenant_id = $1
              AND sessions.user_id = $2
              AND refresh_tokens.used_at IS NULL
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke refresh tokens: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up refresh tokens: {error}")))?;

        Ok(result.rows_affected())
    }
}

/// PostgreSQL implementation of the revoked-token blacklist port.
#[derive(Clone)]
pub struct PostgresRevokedTokenRepository {
    pool: PgPool,
}

impl PostgresRevokedTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevokedTokenRepository for PostgresRevokedTokenRepository {
    async fn add(&self, revoked: RevokedToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(revoked.jti().as_uuid())
        .bind(revoked.expires_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to blacklist token: {error}")))?;

        Ok(())
    }

    async fn contains(&self, jti: TokenId) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, Uuid>("SELECT jti FROM revoked_tokens WHERE jti = $1")
            .bind(jti.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to check token blacklist: {error}")))?;

        Ok(found.is_some())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up token blacklist: {error}")))?;

        Ok(result.rows_affected())
    }
}
