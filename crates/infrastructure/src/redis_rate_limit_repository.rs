//! Redis-backed throttle counters for the unauthenticated identity
//! endpoints.
//!
//! Preferred backend: each `(category, caller)` key is a plain counter
//! whose TTL is the window, so the store forgets a caller on its own as
//! soon as the window elapses and the cleanup job has nothing to do.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use aegis_application::{RateLimitRepository, WindowSnapshot};
use aegis_core::{AppError, AppResult};
use redis::Script;

/// Counts a hit and reads the key's remaining TTL in one round trip.
/// The TTL branch covers a key that survived without an expiry (an
/// interrupted earlier call), which would otherwise throttle its caller
/// forever.
const COUNT_HIT_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
local remaining = redis.call('TTL', KEYS[1])
if remaining < 0 then
  remaining = tonumber(ARGV[1])
  redis.call('EXPIRE', KEYS[1], remaining)
end
return {hits, remaining}
"#;

/// Redis implementation of the throttle-counter port.
#[derive(Clone)]
pub struct RedisRateLimitRepository {
    client: redis::Client,
    namespace: String,
}

impl RedisRateLimitRepository {
    /// Creates a repository. `namespace` prefixes every key so the
    /// identity counters coexist with other tenants of the instance.
    #[must_use]
    pub fn new(client: redis::Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl RateLimitRepository for RedisRateLimitRepository {
    async fn record_hit(&self, key: &str, window_seconds: i64) -> AppResult<WindowSnapshot> {
        if window_seconds <= 0 {
            return Err(AppError::Validation(
                "throttle window must be longer than zero seconds".to_owned(),
            ));
        }

        let namespaced_key = format!("{}:{key}", self.namespace);
        let now = Utc::now();

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let (hits, remaining_seconds): (i64, i64) = Script::new(COUNT_HIT_SCRIPT)
            .key(namespaced_key)
            .arg(window_seconds)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count throttle hit: {error}")))?;

        let hits = i32::try_from(hits)
            .map_err(|error| AppError::Internal(format!("throttle counter out of range: {error}")))?;

        // The key's remaining TTL dates the window: it opened when the
        // full window length was still ahead of it.
        let elapsed = window_seconds.saturating_sub(remaining_seconds).max(0);

        Ok(WindowSnapshot {
            hits,
            window_started_at: now - Duration::seconds(elapsed),
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        // Counters expire with their TTL; there is nothing to sweep.
        Ok(0)
    }
}
