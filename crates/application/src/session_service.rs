//! Session lifecycle: creation, listing, and revocation.
//!
//! Lookups are always scoped to both tenant and owning user in a single
//! query, so "not found" and "not yours" are indistinguishable to a caller
//! probing another user's session identifiers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{Session, SessionId, UserId};

/// Repository port for session persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persists a newly created session.
    async fn create(&self, session: &Session) -> AppResult<()>;

    /// Looks up a session by ID, scoped to the owning tenant and user in
    /// one query so ownership and existence cannot be distinguished by a
    /// caller who does not own the session.
    async fn find_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        session_id: SessionId,
    ) -> AppResult<Option<Session>>;

    /// Lists all sessions for a user, most recently active first.
    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<Session>>;

    /// Counts active (non-revoked, unexpired) sessions for a user.
    async fn count_active_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<usize>;

    /// Returns the oldest active session for a user, by `last_seen_at`.
    async fn oldest_active_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>>;

    /// Persists a revocation or `last_seen_at` update to an existing session.
    async fn save(&self, session: &Session) -> AppResult<()>;

    /// Revokes every active session for a user. Returns the number revoked.
    async fn revoke_all_for_user(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64>;

    /// Removes sessions whose absolute expiry is before `before`. Intended
    /// for periodic cleanup.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Policy applied when a user already has the maximum number of active
/// sessions and authenticates again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrentSessionPolicy {
    /// Reject the new login with [`AppError::Conflict`].
    Reject,
    /// Revoke the least-recently-used session to make room.
    EvictOldest,
}

/// Application service for session lifecycle management.
#[derive(Clone)]
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    max_active_sessions: Option<usize>,
    policy: ConcurrentSessionPolicy,
}

impl SessionService {
    /// Creates a session service with no concurrent-session limit.
    #[must_use]
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            max_active_sessions: None,
            policy: ConcurrentSessionPolicy::EvictOldest,
        }
    }

    /// Applies a concurrent-session cap and the policy to enforce it.
    #[must_use]
    pub fn with_session_limit(mut self, max_active_sessions: usize, policy: ConcurrentSessionPolicy) -> Self {
        self.max_active_sessions = Some(max_active_sessions);
        self.policy = policy;
        self
    }

    /// Creates a new session for a user, enforcing the configured
    /// concurrent-session limit first.
    pub async fn create_session(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        if let Some(max_active_sessions) = self.max_active_sessions {
            let active_count = self.repository.count_active_for_user(tenant_id, user_id, now).await?;
            if active_count >= max_active_sessions {
                match self.policy {
                    ConcurrentSessionPolicy::Reject => {
                        return Err(AppError::Conflict(
                            "maximum number of active sessions reached".to_owned(),
                        ));
                    }
                    ConcurrentSessionPolicy::EvictOldest => {
                        if let Some(mut oldest) = self.repository.oldest_active_for_user(tenant_id, user_id, now).await? {
                            oldest.revoke(now);
                            self.repository.save(&oldest).await?;
                        }
                    }
                }
            }
        }

        let session = Session::new(user_id, tenant_id, ip_address, user_agent, now);
        self.repository.create(&session).await?;
        Ok(session)
    }

    /// Looks up a session the caller owns. Returns [`AppError::NotFound`]
    /// both when the session does not exist and when it belongs to another
    /// user, so the two cases are indistinguishable from the response.
    pub async fn get_owned_session(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        session_id: SessionId,
    ) -> AppResult<Session> {
        self.repository
            .find_for_user(tenant_id, user_id, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".to_owned()))
    }

    /// Lists all sessions belonging to a user.
    pub async fn list_sessions(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<Session>> {
        self.repository.list_for_user(tenant_id, user_id).await
    }

    /// Revokes a single session owned by the caller.
    pub async fn revoke_session(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut session = self.get_owned_session(tenant_id, user_id, session_id).await?;
        session.revoke(now);
        self.repository.save(&session).await
    }

    /// Revokes every session belonging to a user, e.g. after a password
    /// change or suspected compromise. Returns the number revoked.
    pub async fn revoke_all_sessions(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<u64> {
        self.repository.revoke_all_for_user(tenant_id, user_id, now).await
    }

    /// Revokes every active session belonging to a user except one, so a
    /// password change can invalidate every other device while leaving the
    /// session that performed the change intact.
    pub async fn revoke_all_except(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        except_session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let sessions = self.repository.list_for_user(tenant_id, user_id).await?;
        let mut revoked = 0u64;
        for mut session in sessions {
            if session.id() == except_session_id || !session.is_active(now) {
                continue;
            }
            session.revoke(now);
            self.repository.save(&session).await?;
            revoked += 1;
        }
        Ok(revoked)
    }

    /// Marks a session as seen at `now`, e.g. on each successful refresh.
    pub async fn touch_session(&self, mut session: Session, now: DateTime<Utc>) -> AppResult<Session> {
        session.touch(now);
        self.repository.save(&session).await?;
        Ok(session)
    }

    /// Removes sessions past their absolute expiry. Intended for periodic
    /// cleanup.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.repository.cleanup_expired(now).await
    }
}
