//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use aegis_application::{UserRecord, UserRepository};
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::UserId;

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    email_verified: bool,
    active: bool,
    password_hash: String,
    totp_enabled: bool,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            email: row.email,
            email_verified: row.email_verified,
            active: row.active,
            password_hash: row.password_hash,
            totp_enabled: row.totp_enabled,
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, tenant_id, email, email_verified, active, password_hash, totp_enabled
            FROM users
            WHERE tenant_id = $1 AND LOWER(email) = LOWER($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up user by email: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_id(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, tenant_id, email, email_verified, active, password_hash, totp_enabled
            FROM users
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up user by id: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn create(&self, tenant_id: TenantId, email: &str, password_hash: &str, email_verified: bool) -> AppResult<UserId> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (tenant_id, email, email_verified, active, password_hash, totp_enabled)
            VALUES ($1, $2, $3, TRUE, $4, FALSE)
            RETURNING id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(email)
        .bind(email_verified)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(db_error) = &error {
                if db_error.is_unique_violation() {
                    return AppError::Conflict("an account with this email already exists".to_owned());
                }
            }
            AppError::Internal(format!("failed to create user: {error}"))
        })?;

        Ok(UserId::from_uuid(id))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to update password: {error}")))?;

        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to mark email verified: {error}")))?;

        Ok(())
    }

    async fn set_totp_enabled(&self, user_id: UserId, enabled: bool) -> AppResult<()> {
        sqlx::query("UPDATE users SET totp_enabled = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(enabled)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to update totp_enabled: {error}")))?;

        Ok(())
    }
}
