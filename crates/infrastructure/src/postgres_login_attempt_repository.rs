//! PostgreSQL-backed login attempt ledger for lockout and CAPTCHA gating.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use aegis_application::LoginAttemptRepository;
use aegis_core::{AppError, AppResult};
use aegis_domain::LoginAttempt;

/// PostgreSQL implementation of the login attempt repository port.
#[derive(Clone)]
pub struct PostgresLoginAttemptRepository {
    pool: PgPool,
}

impl PostgresLoginAttemptRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAttemptRepository for PostgresLoginAttemptRepository {
    async fn record(&self, attempt: LoginAttempt) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (identifier, ip_address, user_agent, success, attempted_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(attempt.identifier())
        .bind(attempt.ip_address())
        .bind(attempt.user_agent())
        .bind(attempt.success())
        .bind(attempt.attempted_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record login attempt: {error}")))?;

        Ok(())
    }

    async fn count_recent_failures(&self, identifier: &str, since: DateTime<Utc>) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE identifier = $1 AND success = FALSE AND attempted_at >= $2
            "#,
        )
        .bind(identifier)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count recent failures: {error}")))?;

        Ok(count)
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up login attempts: {error}")))?;

        Ok(result.rows_affected())
    }
}
