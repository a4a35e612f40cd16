//! Account lockout and CAPTCHA gating driven by the login attempt ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use aegis_core::{AppError, AppResult};
use aegis_domain::{
    DEFAULT_CAPTCHA_MAX_ATTEMPTS, DEFAULT_LOCKOUT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_WINDOW_MINUTES,
    LoginAttempt,
};

/// Repository port for the login attempt ledger.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    /// Appends a login attempt record.
    async fn record(&self, attempt: LoginAttempt) -> AppResult<()>;

    /// Counts failed attempts for `identifier` recorded at or after `since`.
    async fn count_recent_failures(&self, identifier: &str, since: DateTime<Utc>) -> AppResult<i64>;

    /// Removes attempts recorded before `before`. Intended for periodic cleanup.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Outcome of a lockout/CAPTCHA gate check, evaluated before credentials are
/// verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    /// Whether a CAPTCHA response must accompany the login attempt.
    pub captcha_required: bool,
}

/// Application service enforcing lockout and CAPTCHA policy over the login
/// attempt ledger.
#[derive(Clone)]
pub struct LoginAttemptService {
    repository: Arc<dyn LoginAttemptRepository>,
    lockout_max_attempts: i64,
    lockout_window_minutes: i64,
    captcha_max_attempts: i64,
    /// When set, [`Self::check_gate`] always allows the attempt through
    /// with no CAPTCHA requirement. Used in test and local-development
    /// environments so end-to-end suites don't have to farm CAPTCHA
    /// tokens or pre-seed lockouts to exercise the login flow.
    disabled: bool,
}

impl LoginAttemptService {
    /// Creates a new service using the default lockout and CAPTCHA thresholds.
    #[must_use]
    pub fn new(repository: Arc<dyn LoginAttemptRepository>) -> Self {
        Self {
            repository,
            lockout_max_attempts: DEFAULT_LOCKOUT_MAX_ATTEMPTS,
            lockout_window_minutes: DEFAULT_LOCKOUT_WINDOW_MINUTES,
            captcha_max_attempts: DEFAULT_CAPTCHA_MAX_ATTEMPTS,
            disabled: false,
        }
    }

    /// Creates a service with lockout and CAPTCHA gating disabled outright.
    /// Failed/successful attempts are still recorded, so switching this off
    /// mid-deployment picks up the existing ledger immediately.
    #[must_use]
    pub fn disabled(repository: Arc<dyn LoginAttemptRepository>) -> Self {
        Self { disabled: true, ..Self::new(repository) }
    }

    /// Overrides the default thresholds, e.g. for per-tenant policy.
    #[must_use]
    pub fn with_thresholds(
        mut self,
        lockout_max_attempts: i64,
        lockout_window_minutes: i64,
        captcha_max_attempts: i64,
    ) -> Self {
        self.lockout_max_attempts = lockout_max_attempts;
        self.lockout_window_minutes = lockout_window_minutes;
        self.captcha_max_attempts = captcha_max_attempts;
        self
    }

    /// Checks the lockout and CAPTCHA gates for `identifier` at `now`.
    ///
    /// Returns [`AppError::AccountLocked`] once the failure count reaches
    /// the lockout threshold within the lookback window. Below that
    /// threshold but at or above the (lower) CAPTCHA threshold, returns a
    /// decision requiring CAPTCHA but does not block the attempt outright.
    pub async fn check_gate(&self, identifier: &str, now: DateTime<Utc>) -> AppResult<GateDecision> {
        if self.disabled {
            return Ok(GateDecision { captcha_required: false });
        }

        let window_start = now - Duration::minutes(self.lockout_window_minutes);
        let failures = self.repository.count_recent_failures(identifier, window_start).await?;

        if failures >= self.lockout_max_attempts {
            let retry_after_seconds = self.lockout_window_minutes * 60;
            return Err(AppError::AccountLocked { retry_after_seconds });
        }

        Ok(GateDecision {
            captcha_required: failures >= self.captcha_max_attempts,
        })
    }

    /// Records a failed login attempt.
    pub async fn record_failure(
        &self,
        identifier: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.repository
            .record(LoginAttempt::new(identifier.to_owned(), ip_address, user_agent, false, now))
            .await
    }

    /// Records a successful login attempt.
    pub async fn record_success(
        &self,
        identifier: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.repository
            .record(LoginAttempt::new(identifier.to_owned(), ip_address, user_agent, true, now))
            .await
    }

    /// Removes ledger entries older than the lockout window, plus a safety
    /// margin, relative to `now`. Intended for periodic cleanup.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - Duration::minutes(self.lockout_window_minutes) - Duration::days(1);
        self.repository.cleanup_expired(cutoff).await
    }
}
