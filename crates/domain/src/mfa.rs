//! TOTP-based multi-factor authentication entities.

use chrono::{DateTime, Utc};

/// RFC 6238 time-step, in seconds.
pub const TOTP_STEP_SECONDS: u64 = 30;

/// Number of adjacent time steps accepted either side of the current one.
pub const TOTP_WINDOW_STEPS: i64 = 1;

/// Number of single-use recovery codes issued on enrollment.
pub const RECOVERY_CODE_COUNT: usize = 10;

/// A user's TOTP secret and replay-defense state.
///
/// `secret_ciphertext` is the AES-256-GCM encryption of the raw TOTP secret;
/// the plaintext is never persisted. `highest_counter_used` tracks the
/// highest time-step counter value accepted so far, so a code from an
/// already-consumed (or earlier) step can never be replayed even though
/// TOTP codes are inherently reusable within their validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaSecret {
    secret_ciphertext: Vec<u8>,
    enabled: bool,
    highest_counter_used: Option<i64>,
    enrolled_at: DateTime<Utc>,
}

impl MfaSecret {
    /// Creates a freshly-enrolled, not-yet-confirmed MFA secret.
    #[must_use]
    pub fn new(secret_ciphertext: Vec<u8>, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            secret_ciphertext,
            enabled: false,
            highest_counter_used: None,
            enrolled_at,
        }
    }

    /// Reconstructs an MFA secret from persisted fields.
    #[must_use]
    pub fn from_parts(
        secret_ciphertext: Vec<u8>,
        enabled: bool,
        highest_counter_used: Option<i64>,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            secret_ciphertext,
            enabled,
            highest_counter_used,
            enrolled_at,
        }
    }

    /// Returns the encrypted secret bytes.
    #[must_use]
    pub fn secret_ciphertext(&self) -> &[u8] {
        self.secret_ciphertext.as_slice()
    }

    /// Returns whether MFA has been confirmed and is enforced at login.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the highest TOTP step counter accepted so far.
    #[must_use]
    pub fn highest_counter_used(&self) -> Option<i64> {
        self.highest_counter_used
    }

    /// Returns when the secret was generated.
    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// Marks the secret confirmed after the user proves possession.
    pub fn confirm(&mut self) {
        self.enabled = true;
    }

    /// Returns whether a candidate time-step counter may be accepted.
    ///
    /// A counter is acceptable only if it is strictly greater than the
    /// highest one already consumed, which defeats replay of a previously
    /// used code within the same acceptance window.
    #[must_use]
    pub fn accepts_counter(&self, counter: i64) -> bool {
        match self.highest_counter_used {
            Some(highest) => counter > highest,
            None => true,
        }
    }

    /// Records a newly-consumed counter as the new high-water mark.
    pub fn consume_counter(&mut self, counter: i64) {
        self.highest_counter_used = Some(match self.highest_counter_used {
            Some(highest) => highest.max(counter),
            None => counter,
        });
    }
}

/// A single-use recovery code, stored only as a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaRecoveryCode {
    code_hash: String,
    used_at: Option<DateTime<Utc>>,
}

impl MfaRecoveryCode {
    /// Creates an unused recovery code record from its hash.
    #[must_use]
    pub fn new(code_hash: String) -> Self {
        Self {
            code_hash,
            used_at: None,
        }
    }

    /// Reconstructs a recovery code record from persisted fields.
    #[must_use]
    pub fn from_parts(code_hash: String, used_at: Option<DateTime<Utc>>) -> Self {
        Self { code_hash, used_at }
    }

    /// Returns the stored hash of the code.
    #[must_use]
    pub fn code_hash(&self) -> &str {
        self.code_hash.as_str()
    }

    /// Returns whether the code has already been consumed.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Marks the code as consumed.
    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.used_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_secret_accepts_any_counter() {
        let secret = MfaSecret::new(vec![1, 2, 3], Utc::now());
        assert!(secret.accepts_counter(100));
    }

    #[test]
    fn consumed_counter_cannot_be_replayed() {
        let mut secret = MfaSecret::new(vec![1, 2, 3], Utc::now());
        secret.consume_counter(100);
        assert!(!secret.accepts_counter(100));
        assert!(!secret.accepts_counter(99));
        assert!(secret.accepts_counter(101));
    }

    #[test]
    fn recovery_code_is_single_use() {
        let mut code = MfaRecoveryCode::new("hash".to_owned());
        assert!(!code.is_used());
        code.mark_used(Utc::now());
        assert!(code.is_used());
    }
}
