//! PostgreSQL-backed throttle counters for the unauthenticated identity
//! endpoints.
//!
//! Fallback backend: Redis is preferred for these counters since they
//! are hot-path and disposable, but a deployment without Redis still
//! gets working login/registration/reset throttling out of one UPSERT
//! per request.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use aegis_application::{RateLimitRepository, WindowSnapshot};
use aegis_core::{AppError, AppResult};

/// PostgreSQL implementation of the throttle-counter port, one row per
/// `(category, caller)` key in `rate_limit_windows`.
#[derive(Clone)]
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WindowRow {
    hits: i32,
    window_started_at: DateTime<Utc>,
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn record_hit(&self, key: &str, window_seconds: i64) -> AppResult<WindowSnapshot> {
        let now = Utc::now();
        // A window that opened at or before this cutoff has elapsed and
        // is restarted by the same statement that counts the hit, so two
        // concurrent requests cannot both observe a half-reset row.
        let elapsed_cutoff = now - Duration::seconds(window_seconds);

        let row = sqlx::query_as::<_, WindowRow>(
            r#"
            INSERT INTO rate_limit_windows (key, window_started_at, hits)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE
            SET
                hits = CASE
                    WHEN rate_limit_windows.window_started_at <= $3 THEN 1
                    ELSE rate_limit_windows.hits + 1
                END,
                window_started_at = CASE
                    WHEN rate_limit_windows.window_started_at <= $3 THEN $2
                    ELSE rate_limit_windows.window_started_at
                END
            RETURNING hits, window_started_at
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(elapsed_cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record throttle hit: {error}")))?;

        Ok(WindowSnapshot {
            hits: row.hits,
            window_started_at: row.window_started_at,
        })
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_windows WHERE window_started_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to clean up throttle windows: {error}")))?;

        Ok(result.rows_affected())
    }
}
