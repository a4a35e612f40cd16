//! Refresh-token and revocation-blacklist entities.
//!
//! A refresh token's lifecycle is: issued -> (optionally) consumed exactly
//! once during rotation -> replaced by a new `jti`. Presenting an
//! already-consumed token a second time is replay and must be rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionId;

/// JWT `jti` claim value, unique per issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Creates a new random token identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as a token identifier.
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

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A persisted refresh token record.
///
/// The raw token is never stored; only `token_hash`, the SHA-256 hex digest
/// of the bearer value, is kept at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    jti: TokenId,
    session_id: SessionId,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    replaced_by: Option<TokenId>,
}

impl RefreshToken {
    /// Creates a new, not-yet-used refresh token record.
    ///
    /// `token_hash` must be a fixed-length hex digest; a placeholder or
    /// empty value is rejected to prevent accidentally storing an
    /// unauthenticated/blank credential.
    pub fn new(
        jti: TokenId,
        session_id: SessionId,
        token_hash: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, aegis_core::AppError> {
        if token_hash.is_empty() || token_hash.len() != 64 || !token_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(aegis_core::AppError::Validation(
                "refresh token hash must be a 64-character hex digest".to_owned(),
            ));
        }

        Ok(Self {
            jti,
            session_id,
            token_hash,
            issued_at,
            expires_at,
            used_at: None,
            replaced_by: None,
        })
    }

    /// Reconstructs a refresh token record from persisted fields.
    #[must_use]
    pub fn from_parts(
        jti: TokenId,
        session_id: SessionId,
        token_hash: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        used_at: Option<DateTime<Utc>>,
        replaced_by: Option<TokenId>,
    ) -> Self {
        Self {
            jti,
            session_id,
            token_hash,
            issued_at,
            expires_at,
            used_at,
            replaced_by,
        }
    }

    /// Returns the token's `jti`.
    #[must_use]
    pub fn jti(&self) -> TokenId {
        self.jti
    }

    /// Returns the owning session.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the stored hash of the bearer value.
    #[must_use]
    pub fn token_hash(&self) -> &str {
        self.token_hash.as_str()
    }

    /// Returns when this token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the token's expiry.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns when the token was consumed during rotation, if ever.
    #[must_use]
    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    /// Returns the `jti` of the token that replaced this one, if rotated.
    #[must_use]
    pub fn replaced_by(&self) -> Option<TokenId> {
        self.replaced_by
    }

    /// A refresh token is valid for rotation iff unused and unexpired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }

    /// Marks the token as consumed, recording the successor's `jti`.
    ///
    /// Calling this a second time is the replay condition: callers must
    /// check `used_at().is_some()` before invoking it and treat that case
    /// as `AppError::TokenReplay`.
    pub fn mark_used(&mut self, replaced_by: TokenId, at: DateTime<Utc>) {
        self.used_at = Some(at);
        self.replaced_by = Some(replaced_by);
    }
}

/// A blacklist entry for a token whose `jti` must be rejected outright,
/// independent of the underlying refresh-token row's `used_at` state.
///
/// Populated on explicit logout/revocation so that checking the blacklist
/// is a fast, single-key lookup ahead of the row-level validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokedToken {
    jti: TokenId,
    expires_at: DateTime<Utc>,
}

impl RevokedToken {
    /// Creates a blacklist entry, expiring alongside the token itself so
    /// the table can be purged without ever blacklisting forever.
    #[must_use]
    pub fn new(jti: TokenId, expires_at: DateTime<Utc>) -> Self {
        Self { jti, expires_at }
    }

    /// Returns the blacklisted token identifier.
    #[must_use]
    pub fn jti(&self) -> TokenId {
        self.jti
    }

    /// Returns when this blacklist entry itself may be purged.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_hash_is_rejected() {
        let result = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            "placeholder_hash".to_owned(),
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_hash_is_rejected() {
        let result = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            String::new(),
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn valid_64_char_hex_hash_is_accepted() {
        let hash = "a".repeat(64);
        let result = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            hash,
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn unused_unexpired_token_is_valid() {
        let now = Utc::now();
        let token = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            "b".repeat(64),
            now,
            now + chrono::Duration::days(1),
        )
        .unwrap_or_else(|_| panic!("test"));
        assert!(token.is_valid(now));
    }

    #[test]
    fn used_token_is_invalid_and_replay_detectable() {
        let now = Utc::now();
        let mut token = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            "c".repeat(64),
            now,
            now + chrono::Duration::days(1),
        )
        .unwrap_or_else(|_| panic!("test"));
        let successor = TokenId::new();
        token.mark_used(successor, now);
        assert!(!token.is_valid(now));
        assert_eq!(token.replaced_by(), Some(successor));
    }

    #[test]
    fn expired_unused_token_is_invalid() {
        let now = Utc::now();
        let token = RefreshToken::new(
            TokenId::new(),
            SessionId::new(),
            "d".repeat(64),
            now - chrono::Duration::days(2),
            now - chrono::Duration::days(1),
        )
        .unwrap_or_else(|_| panic!("test"));
        assert!(!token.is_valid(now));
    }
}

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// The stored hash must always be a 64-character hex digest;
        /// anything else is rejected at construction.
        #[test]
        fn token_hash_shape_is_enforced(hash in "[0-9a-fA-F]{0,80}") {
            let now = Utc::now();
            let result = RefreshToken::new(
                TokenId::new(),
                SessionId::new(),
                hash.clone(),
                now,
                now + chrono::Duration::days(1),
            );
            prop_assert_eq!(result.is_ok(), hash.len() == 64);
        }

        /// Once consumed, a token is invalid at every instant, regardless
        /// of how far its nominal expiry lies in the future.
        #[test]
        fn used_token_is_invalid_forever(expiry_minutes in 1i64..60_000, probe_minutes in -60_000i64..60_000) {
            let now = Utc::now();
            let mut token = RefreshToken::new(
                TokenId::new(),
                SessionId::new(),
                "e".repeat(64),
                now,
                now + chrono::Duration::minutes(expiry_minutes),
            )
            .unwrap_or_else(|_| panic!("valid construction"));

            token.mark_used(TokenId::new(), now);
            prop_assert!(!token.is_valid(now + chrono::Duration::minutes(probe_minutes)));
        }
    }
}
