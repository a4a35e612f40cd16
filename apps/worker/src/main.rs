//! Aegis maintenance worker.
//!
//! Periodically purges rows the request path only ever appends to:
//! expired refresh tokens, blacklist entries whose token would have
//! expired anyway, sessions past their absolute expiry, stale login
//! attempts, spent password-reset tokens, and elapsed rate-limit
//! windows. Runs as a separate binary so the purge cadence is
//! independent of API deployment and load.

#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use aegis_application::{
    LoginAttemptRepository, PasswordResetRepository, RateLimitRepository, RevokedTokenRepository,
    SessionRepository, TokenRepository,
};
use aegis_core::{AppError, AppResult};
use aegis_infrastructure::{
    PostgresLoginAttemptRepository, PostgresPasswordResetRepository, PostgresRateLimitRepository,
    PostgresRevokedTokenRepository, PostgresSessionRepository, PostgresTokenRepository,
};
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    cleanup_interval_seconds: u64,
    /// How long login-attempt rows are kept. They only feed the lockout
    /// and CAPTCHA windows, so anything older than the window is dead
    /// weight, but a longer retention helps when investigating a
    /// credential-stuffing run after the fact.
    login_attempt_retention_hours: i64,
}

impl WorkerConfig {
    fn load() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let cleanup_interval_seconds = parse_env_u64("CLEANUP_INTERVAL_SECONDS", 15 * 60)?;
        let login_attempt_retention_hours = parse_env_i64("LOGIN_ATTEMPT_RETENTION_HOURS", 24)?;

        Ok(Self {
            database_url,
            cleanup_interval_seconds,
            login_attempt_retention_hours,
        })
    }
}

struct MaintenanceStores {
    tokens: PostgresTokenRepository,
    revoked_tokens: PostgresRevokedTokenRepository,
    sessions: PostgresSessionRepository,
    login_attempts: PostgresLoginAttemptRepository,
    password_resets: PostgresPasswordResetRepository,
    rate_limits: PostgresRateLimitRepository,
}

impl MaintenanceStores {
    fn new(pool: &PgPool) -> Self {
        Self {
            tokens: PostgresTokenRepository::new(pool.clone()),
            revoked_tokens: PostgresRevokedTokenRepository::new(pool.clone()),
            sessions: PostgresSessionRepository::new(pool.clone()),
            login_attempts: PostgresLoginAttemptRepository::new(pool.clone()),
            password_resets: PostgresPasswordResetRepository::new(pool.clone()),
            rate_limits: PostgresRateLimitRepository::new(pool.clone()),
        }
    }

    async fn run_cleanup(&self, config: &WorkerConfig) -> AppResult<()> {
        let now = Utc::now();

        let tokens = self.tokens.cleanup_expired(now).await?;
        let revoked = self.revoked_tokens.cleanup_expired(now).await?;
        let sessions = self.sessions.cleanup_expired(now).await?;

        let attempt_cutoff = now - ChronoDuration::hours(config.login_attempt_retention_hours);
        let attempts = self.login_attempts.cleanup_expired(attempt_cutoff).await?;

        let resets = self.password_resets.cleanup_expired(now).await?;

        // Throttle windows are at most an hour long; a day-old cutoff
        // only ever removes rows no active window can still be using.
        let window_cutoff = now - ChronoDuration::hours(24);
        let rate_limits = self.rate_limits.cleanup_expired(window_cutoff).await?;

        info!(
            tokens,
            revoked, sessions, attempts, resets, rate_limits, "cleanup pass complete"
        );

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    let stores = MaintenanceStores::new(&pool);

    info!(
        interval_seconds = config.cleanup_interval_seconds,
        "aegis-worker started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds));
    loop {
        ticker.tick().await;
        if let Err(error) = stores.run_cleanup(&config).await {
            // A failed pass is retried on the next tick; expired rows are
            // harmless in the meantime, they just take up space.
            warn!(%error, "cleanup pass failed");
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> Result<i64, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
