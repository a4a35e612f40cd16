//! Login attempt ledger backing account lockout and CAPTCHA gating.

use chrono::{DateTime, Utc};

use aegis_core::TenantId;

use crate::user::EmailAddress;

/// Default number of recent failures that trigger account lockout.
pub const DEFAULT_LOCKOUT_MAX_ATTEMPTS: i64 = 5;

/// Default lookback window, in minutes, for both lockout and CAPTCHA gating.
pub const DEFAULT_LOCKOUT_WINDOW_MINUTES: i64 = 30;

/// Default number of recent failures that trigger a CAPTCHA challenge.
pub const DEFAULT_CAPTCHA_MAX_ATTEMPTS: i64 = 3;

/// Builds the per-account identifier used to key lockout/CAPTCHA counts.
///
/// Always lowercases the email so counting is unaffected by case variation
/// in how the client submitted credentials.
#[must_use]
pub fn account_identifier(email: &EmailAddress, tenant_id: TenantId) -> String {
    format!("{}@tenant:{}", email.as_str(), tenant_id)
}

/// A single recorded login attempt, success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    identifier: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    success: bool,
    attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    /// Records a new login attempt.
    #[must_use]
    pub fn new(
        identifier: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
        success: bool,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            ip_address,
            user_agent,
            success,
            attempted_at,
        }
    }

    /// Returns the account or IP identifier this attempt is keyed by.
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.identifier.as_str()
    }

    /// Returns the client IP address, if known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the client user agent, if known.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns whether the login attempt succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns when the attempt was recorded.
    #[must_use]
    pub fn attempted_at(&self) -> DateTime<Utc> {
        self.attempted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::EmailAddress;

    #[test]
    fn account_identifier_lowercases_email() {
        let tenant = TenantId::new();
        let email = EmailAddress::new("User@Example.com").unwrap_or_else(|_| panic!("test"));
        let identifier = account_identifier(&email, tenant);
        assert!(identifier.starts_with("user@example.com@tenant:"));
    }
}
