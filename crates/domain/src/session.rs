//! Session entity: the root of a logged-in device's token lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aegis_core::TenantId;

use crate::user::UserId;

/// Sessions never outlive this ceiling, regardless of refresh activity.
pub const SESSION_ABSOLUTE_EXPIRY_DAYS: i64 = 30;

/// Unique, opaque session identifier. Never derived from anything guessable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as a session identifier.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A logged-in device/browser session.
///
/// `absolute_expiry` is fixed at creation and never moves forward; every
/// refresh-token issued under this session has its `expires_at` truncated
/// to at most `absolute_expiry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    tenant_id: TenantId,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    absolute_expiry: DateTime<Utc>,
}

impl Session {
    /// Creates a new active session with a 30-day absolute expiry ceiling.
    #[must_use]
    pub fn new(
        user_id: UserId,
        tenant_id: TenantId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            tenant_id,
            created_at: now,
            last_seen_at: now,
            ip_address,
            user_agent,
            revoked_at: None,
            absolute_expiry: now + chrono::Duration::days(SESSION_ABSOLUTE_EXPIRY_DAYS),
        }
    }

    /// Reconstructs a session from persisted fields.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: SessionId,
        user_id: UserId,
        tenant_id: TenantId,
        created_at: DateTime<Utc>,
        last_seen_at: DateTime<Utc>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        revoked_at: Option<DateTime<Utc>>,
        absolute_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            tenant_id,
            created_at,
            last_seen_at,
            ip_address,
            user_agent,
            revoked_at,
            absolute_expiry,
        }
    }

    /// A session is active iff it has not been revoked and its absolute
    /// expiry has not elapsed.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.absolute_expiry
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last time this session was used to refresh or authenticate.
    #[must_use]
    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    /// Returns the IP address recorded at session creation.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the user agent recorded at session creation.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns the revocation timestamp, if revoked.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns the immutable absolute expiry ceiling.
    #[must_use]
    pub fn absolute_expiry(&self) -> DateTime<Utc> {
        self.absolute_expiry
    }

    /// Caps a candidate expiry at this session's absolute ceiling.
    #[must_use]
    pub fn cap_expiry(&self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        candidate.min(self.absolute_expiry)
    }

    /// Marks the session as revoked at the given instant.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }

    /// Bumps the last-seen timestamp, used on every successful refresh.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(now: DateTime<Utc>) -> Session {
        Session::new(UserId::new(), TenantId::new(), Some("203.0.113.1".to_owned()), None, now)
    }

    #[test]
    fn fresh_session_is_active() {
        let now = Utc::now();
        let session = sample_session(now);
        assert!(session.is_active(now));
    }

    #[test]
    fn revoked_session_is_inactive() {
        let now = Utc::now();
        let mut session = sample_session(now);
        session.revoke(now);
        assert!(!session.is_active(now));
    }

    #[test]
    fn session_past_absolute_expiry_is_inactive() {
        let now = Utc::now();
        let session = sample_session(now);
        let far_future = now + chrono::Duration::days(SESSION_ABSOLUTE_EXPIRY_DAYS + 1);
        assert!(!session.is_active(far_future));
    }

    #[test]
    fn cap_expiry_never_exceeds_absolute_expiry() {
        let now = Utc::now();
        let session = sample_session(now);
        let candidate = now + chrono::Duration::days(365);
        assert_eq!(session.cap_expiry(candidate), session.absolute_expiry());
    }
}

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// The absolute expiry is a hard ceiling: no candidate expiry,
        /// however far out, survives capping above it.
        #[test]
        fn capped_expiry_is_bounded_by_absolute_expiry(offset_minutes in -60_000i64..60_000i64) {
            let now = Utc::now();
            let session = Session::new(UserId::new(), TenantId::new(), None, None, now);
            let candidate = now + chrono::Duration::minutes(offset_minutes);

            let capped = session.cap_expiry(candidate);
            prop_assert!(capped <= session.absolute_expiry());
            prop_assert_eq!(capped, candidate.min(session.absolute_expiry()));
        }

        /// A revoked session is inactive at every instant, before and
        /// after the revocation timestamp.
        #[test]
        fn revoked_session_is_never_active(offset_minutes in -60_000i64..60_000i64) {
            let now = Utc::now();
            let mut session = Session::new(UserId::new(), TenantId::new(), None, None, now);
            session.revoke(now);

            let probe = now + chrono::Duration::minutes(offset_minutes);
            prop_assert!(!session.is_active(probe));
        }
    }
}
