//! PostgreSQL-backed append-only audit log repository.

use async_trait::async_trait;
use sqlx::PgPool;

use aegis_application::AuditRepository;
use aegis_core::{AppError, AppResult};
use aegis_domain::AuditLogEntry;

/// PostgreSQL implementation of the audit repository port.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                id,
                tenant_id,
                actor_user_id,
                action,
                ip_address,
                user_agent,
                session_id,
                success,
                details,
                is_sensitive,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id())
        .bind(entry.tenant_id().as_uuid())
        .bind(entry.actor_user_id())
        .bind(entry.action().as_str())
        .bind(entry.ip_address())
        .bind(entry.user_agent())
        .bind(entry.session_id())
        .bind(entry.success())
        .bind(entry.details())
        .bind(entry.is_sensitive())
        .bind(entry.created_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }
}
