//! Password-reset token entity.
//!
//! Requesting a reset never reveals whether the email is registered; the
//! uniform response lives at the application layer. This entity only
//! models the token's own lifecycle once one has been issued.

use chrono::{DateTime, Utc};

use crate::user::UserId;

/// Default password-reset token lifetime.
pub const PASSWORD_RESET_TOKEN_TTL_MINUTES: i64 = 30;

/// A single-use, hashed password-reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    user_id: UserId,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    /// Creates a new, unused password-reset token record.
    #[must_use]
    pub fn new(user_id: UserId, token_hash: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash,
            issued_at,
            expires_at: issued_at + chrono::Duration::minutes(PASSWORD_RESET_TOKEN_TTL_MINUTES),
            used_at: None,
        }
    }

    /// Reconstructs a password-reset token from persisted fields.
    #[must_use]
    pub fn from_parts(
        user_id: UserId,
        token_hash: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        used_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            token_hash,
            issued_at,
            expires_at,
            used_at,
        }
    }

    /// Returns the owning user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the stored hash of the bearer token.
    #[must_use]
    pub fn token_hash(&self) -> &str {
        self.token_hash.as_str()
    }

    /// Returns when the token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the token's expiry.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns when the token was consumed, if ever.
    #[must_use]
    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    /// A reset token is valid for consumption iff unused and unexpired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }

    /// Marks the token as consumed.
    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.used_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid() {
        let now = Utc::now();
        let token = PasswordResetToken::new(UserId::new(), "hash".to_owned(), now);
        assert!(token.is_valid(now));
    }

    #[test]
    fn used_token_is_invalid() {
        let now = Utc::now();
        let mut token = PasswordResetToken::new(UserId::new(), "hash".to_owned(), now);
        token.mark_used(now);
        assert!(!token.is_valid(now));
    }

    #[test]
    fn expired_token_is_invalid() {
        let now = Utc::now();
        let token = PasswordResetToken::new(
            UserId::new(),
            "hash".to_owned(),
            now - chrono::Duration::minutes(PASSWORD_RESET_TOKEN_TTL_MINUTES + 1),
        );
        assert!(!token.is_valid(now));
    }
}
