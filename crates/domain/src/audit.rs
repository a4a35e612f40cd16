//! Audit log entity and the stable catalog of auditable actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aegis_core::TenantId;

/// Stable, append-only-log actions emitted by the identity and session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A user registered a new account.
    UserRegistered,
    /// A login attempt succeeded.
    LoginSucceeded,
    /// A login attempt failed due to bad credentials.
    LoginFailed,
    /// A login attempt was rejected because the account is locked out.
    LoginLockedOut,
    /// A login attempt required a CAPTCHA that was missing or invalid.
    LoginCaptchaRequired,
    /// An MFA challenge was issued after a successful password check.
    MfaChallengeIssued,
    /// An MFA code or recovery code was verified.
    MfaVerified,
    /// An MFA code or recovery code was rejected.
    MfaRejected,
    /// MFA was enrolled for an account.
    MfaEnrolled,
    /// MFA was disabled for an account.
    MfaDisabled,
    /// Recovery codes were regenerated.
    MfaRecoveryCodesRegenerated,
    /// A refresh token was rotated.
    TokenRefreshed,
    /// A refresh token replay was detected and rejected.
    TokenReplayDetected,
    /// A refresh was presented from an IP address or user agent that does
    /// not match the session's creation-time fingerprint. Diagnostic only:
    /// the refresh still succeeds, since travel and rotating mobile carrier
    /// IPs make this too noisy to enforce outright.
    SessionHijackSuspected,
    /// A session was terminated by its owner.
    SessionTerminated,
    /// All sessions for a user were terminated at once.
    SessionsMassInvalidated,
    /// A password was changed.
    PasswordChanged,
    /// A password reset was requested.
    PasswordResetRequested,
    /// A password reset was completed.
    PasswordResetCompleted,
    /// An API key was created.
    ApiKeyCreated,
    /// An API key was revoked.
    ApiKeyRevoked,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegistered => "user.registered",
            Self::LoginSucceeded => "login.succeeded",
            Self::LoginFailed => "login.failed",
            Self::LoginLockedOut => "login.locked_out",
            Self::LoginCaptchaRequired => "login.captcha_required",
            Self::MfaChallengeIssued => "mfa.challenge_issued",
            Self::MfaVerified => "mfa.verified",
            Self::MfaRejected => "mfa.rejected",
            Self::MfaEnrolled => "mfa.enrolled",
            Self::MfaDisabled => "mfa.disabled",
            Self::MfaRecoveryCodesRegenerated => "mfa.recovery_codes_regenerated",
            Self::TokenRefreshed => "token.refreshed",
            Self::TokenReplayDetected => "token.replay_detected",
            Self::SessionHijackSuspected => "session.hijack_suspected",
            Self::SessionTerminated => "session.terminated",
            Self::SessionsMassInvalidated => "session.mass_invalidated",
            Self::PasswordChanged => "password.changed",
            Self::PasswordResetRequested => "password.reset_requested",
            Self::PasswordResetCompleted => "password.reset_completed",
            Self::ApiKeyCreated => "api_key.created",
            Self::ApiKeyRevoked => "api_key.revoked",
        }
    }

    /// Actions whose audit entries must be flagged sensitive: password and
    /// MFA changes, and bulk session invalidation.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::PasswordChanged
                | Self::PasswordResetCompleted
                | Self::MfaDisabled
                | Self::MfaRecoveryCodesRegenerated
                | Self::SessionsMassInvalidated
                | Self::SessionHijackSuspected
        )
    }
}

/// A single append-only audit log entry.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    id: Uuid,
    tenant_id: TenantId,
    actor_user_id: Option<Uuid>,
    action: AuditAction,
    ip_address: Option<String>,
    user_agent: Option<String>,
    session_id: Option<Uuid>,
    success: bool,
    details: Option<serde_json::Value>,
    is_sensitive: bool,
    created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates a new audit entry. `is_sensitive` is derived from the action
    /// unless explicitly overridden by the caller for a finer-grained case.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        actor_user_id: Option<Uuid>,
        action: AuditAction,
        ip_address: Option<String>,
        user_agent: Option<String>,
        session_id: Option<Uuid>,
        success: bool,
        details: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let is_sensitive = action.is_sensitive();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            actor_user_id,
            action,
            ip_address,
            user_agent,
            session_id,
            success,
            details,
            is_sensitive,
            created_at,
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the acting user, if the event was attributable to one.
    #[must_use]
    pub fn actor_user_id(&self) -> Option<Uuid> {
        self.actor_user_id
    }

    /// Returns the action that was recorded.
    #[must_use]
    pub fn action(&self) -> AuditAction {
        self.action
    }

    /// Returns the client IP, if known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the client user agent, if known.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns the session associated with this event, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Returns whether the underlying action succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns free-form structured detail attached to the event.
    #[must_use]
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Returns whether this entry is flagged sensitive.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive
    }

    /// Returns when the entry was recorded.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
