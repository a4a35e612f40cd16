//! PostgreSQL-backed session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use aegis_application::SessionRepository;
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{Session, SessionId, UserId};

/// PostgreSQL implementation of the session repository port.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    tenant_id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    absolute_expiry: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session::from_parts(
            SessionId::from_uuid(row.id),
            UserId::from_uuid(row.user_id),
            TenantId::from_uuid(row.tenant_id),
            row.created_at,
            row.last_seen_at,
            row.ip_address,
            row.user_agent,
            row.revoked_at,
            row.absolute_expiry,
        )
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(&self, session: &Session) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, tenant_id, user_id, created_at, last_seen_at,
                ip_address, user_agent, revoked_at, absolute_expiry
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.tenant_id().as_uuid())
        .bind(session.user_id().as_uuid())
        .bind(session.created_at())
        .bind(session.last_seen_at())
        .bind(session.ip_address())
        .bind(session.user_agent())
        .bind(session.revoked_at())
        .bind(session.absolute_expiry())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create session: {error}")))?;

        Ok(())
    }

    async fn find_for_user(&self, tenant_id: TenantId, user_id: UserId, session_id: SessionId) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, user_id, created_at, last_seen_at,
                   ip_address, user_agent, revoked_at, absolute_expiry
            FROM sessions
            WHERE id = $1 AND tenant_id = $2 AND user_id = $3
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up session: {error}")))?;

        Ok(row.map(Session::from))
    }

    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, user_id, created_at, last_seen_at,
                   ip_address, user_agent, revoked_at, absolute_expiry
            FROM sessions
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY last_seen_at DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list sessions: {error}")))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn count_active_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM sessions
            WHERE tenant_id = $1 AND user_id = $2 AND revoked_at IS NULL AND absolute_expiry > $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count active sessions: {error}")))?;

        Ok(count.max(0) as usize)
    }

    async fn oldest_active_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, tenant_id, user_id, created_at, last_seen_at,
                   ip_address, user_agent, revoked_at, absolute_expiry
            FROM sessions
            WHERE tenant_id = $1 AND user_id = $2 AND revoked_at IS NULL AND absolute_expiry > $3
            ORDER BY last_seen_at ASC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find oldest active session: {error}")))?;

        Ok(row.map(Session::from))
    }

    async fn save(&self, session: &Session) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET last_seen_at = $2, revoked_at = $3
            WHERE id = $1
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.last_seen_at())
        .bind(session.revoked_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save session: {error}")))?;

        Ok(())
    }

    async fn revoke_all_for_user(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = $3
            WHERE tenant_id = $1 AND user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke sessions: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE absolute_expiry < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up sessions: {error}")))?;

        Ok(result.rows_affected())
    }
}
