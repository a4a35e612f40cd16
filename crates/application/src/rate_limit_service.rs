//! Per-caller throttling for the unauthenticated identity endpoints.
//!
//! This limiter is the outer line of defense in front of login,
//! registration, and password reset, and it is deliberately distinct
//! from the account-lockout ledger in
//! [`crate::login_attempt_service`]: the ledger counts failures against
//! one *account* and locks that account, while this limiter counts
//! requests from one *caller* (keyed by client IP at the HTTP layer)
//! and slows the caller down before any password is ever verified. A
//! credential-stuffing run trips this first; a targeted attack on a
//! single account trips the ledger.
//!
//! Counters are hot-path and disposable, so the preferred backing store
//! is Redis (a counter with a TTL); a Postgres window table serves as
//! the fallback when no Redis instance is configured.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aegis_core::{AppError, AppResult};

/// How many requests a single caller may make against one category of
/// endpoint within a window.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    /// Endpoint category the rule protects, used as the counter key
    /// prefix (`"login"`, `"register"`, `"password_reset"`).
    pub category: String,
    /// Requests allowed per caller within one window.
    pub max_attempts: i32,
    /// Window length in seconds.
    pub window_seconds: i64,
}

impl RateLimitRule {
    /// Creates a rule with explicit limits.
    #[must_use]
    pub fn new(category: impl Into<String>, max_attempts: i32, window_seconds: i64) -> Self {
        Self {
            category: category.into(),
            max_attempts,
            window_seconds,
        }
    }

    /// Throttle for credential submission. Generous enough for a user
    /// fumbling a password a few times, far below stuffing-run volume.
    #[must_use]
    pub fn login() -> Self {
        Self::new("login", 10, 15 * 60)
    }

    /// Throttle for account creation, which is the cheapest endpoint for
    /// an attacker to spam.
    #[must_use]
    pub fn registration() -> Self {
        Self::new("register", 5, 60 * 60)
    }

    /// Throttle for reset-mail requests. The reset service additionally
    /// enforces a per-account hourly cap; this one bounds what a single
    /// caller can trigger across many accounts.
    #[must_use]
    pub fn password_reset() -> Self {
        Self::new("password_reset", 5, 60 * 60)
    }
}

/// State of a caller's active window, including the hit being recorded.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    /// Hits recorded in the window so far.
    pub hits: i32,
    /// When the window opened.
    pub window_started_at: DateTime<Utc>,
}

/// Repository port for the throttle counters.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Counts one hit against `key`, opening a fresh window first if the
    /// previous one has elapsed.
    async fn record_hit(&self, key: &str, window_seconds: i64) -> AppResult<WindowSnapshot>;

    /// Removes windows that opened before `before`. A no-op for backends
    /// whose entries expire on their own.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Application service enforcing [`RateLimitRule`]s over the counter store.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Counts the current request against `rule` and rejects it with
    /// [`AppError::RateLimited`] once the caller exceeds the rule's
    /// budget. `caller_key` identifies the caller, typically a client IP.
    ///
    /// The hit is recorded before the comparison, so requests arriving
    /// while the limit is exceeded still extend the pressure the caller
    /// is exerting rather than being free probes.
    pub async fn check_rate_limit(&self, rule: &RateLimitRule, caller_key: &str) -> AppResult<()> {
        let counter_key = format!("{}:{caller_key}", rule.category);
        let window = self.repository.record_hit(&counter_key, rule.window_seconds).await?;

        if window.hits > rule.max_attempts {
            return Err(AppError::RateLimited(
                "too many requests, please try again later".to_owned(),
            ));
        }

        Ok(())
    }

    /// Removes stale windows. Only meaningful for the Postgres backend;
    /// Redis counters carry their own TTL.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        // Anything older than a day is past every configured window.
        let cutoff = now - chrono::Duration::hours(24);
        self.repository.cleanup_expired(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct InMemoryCounters {
        windows: Mutex<std::collections::HashMap<String, WindowSnapshot>>,
    }

    #[async_trait]
    impl RateLimitRepository for InMemoryCounters {
        async fn record_hit(&self, key: &str, window_seconds: i64) -> AppResult<WindowSnapshot> {
            let mut windows = self.windows.lock().unwrap_or_else(|poison| poison.into_inner());
            let now = Utc::now();
            let entry = windows
                .entry(key.to_owned())
                .and_modify(|window| {
                    if window.window_started_at + chrono::Duration::seconds(window_seconds) < now {
                        window.hits = 1;
                        window.window_started_at = now;
                    } else {
                        window.hits += 1;
                    }
                })
                .or_insert(WindowSnapshot { hits: 1, window_started_at: now });
            Ok(entry.clone())
        }

        async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
            let mut windows = self.windows.lock().unwrap_or_else(|poison| poison.into_inner());
            let before_count = windows.len();
            windows.retain(|_, window| window.window_started_at >= before);
            Ok((before_count - windows.len()) as u64)
        }
    }

    fn service() -> RateLimitService {
        RateLimitService::new(Arc::new(InMemoryCounters { windows: Mutex::new(std::collections::HashMap::new()) }))
    }

    #[tokio::test]
    async fn requests_within_budget_pass() {
        let service = service();
        let rule = RateLimitRule::new("login", 3, 60);

        for _ in 0..3 {
            assert!(service.check_rate_limit(&rule, "203.0.113.7").await.is_ok());
        }
    }

    #[tokio::test]
    async fn request_over_budget_is_rejected() {
        let service = service();
        let rule = RateLimitRule::new("login", 3, 60);

        for _ in 0..3 {
            let _ = service.check_rate_limit(&rule, "203.0.113.7").await;
        }

        let result = service.check_rate_limit(&rule, "203.0.113.7").await;
        assert!(matches!(result, Err(AppError::RateLimited(_))));
    }

    #[tokio::test]
    async fn callers_are_throttled_independently() {
        let service = service();
        let rule = RateLimitRule::new("login", 1, 60);

        let _ = service.check_rate_limit(&rule, "203.0.113.7").await;
        let first = service.check_rate_limit(&rule, "203.0.113.7").await;
        assert!(first.is_err());

        let other = service.check_rate_limit(&rule, "198.51.100.9").await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn categories_do_not_share_budgets() {
        let service = service();
        let login = RateLimitRule::new("login", 1, 60);
        let reset = RateLimitRule::new("password_reset", 1, 60);

        let _ = service.check_rate_limit(&login, "203.0.113.7").await;
        assert!(service.check_rate_limit(&login, "203.0.113.7").await.is_err());
        assert!(service.check_rate_limit(&reset, "203.0.113.7").await.is_ok());
    }
}
