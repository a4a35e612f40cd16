//! Domain entities and invariants for the identity and session core.

#![forbid(unsafe_code)]

mod api_key;
mod audit;
mod login_attempt;
mod mfa;
mod password_reset;
mod session;
mod tenant;
mod token;
mod user;

pub use api_key::{ApiKey, ApiKeyId};
pub use audit::{AuditAction, AuditLogEntry};
pub use login_attempt::{
    DEFAULT_CAPTCHA_MAX_ATTEMPTS, DEFAULT_LOCKOUT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_WINDOW_MINUTES,
    LoginAttempt, account_identifier,
};
pub use mfa::{
    MfaRecoveryCode, MfaSecret, RECOVERY_CODE_COUNT, TOTP_STEP_SECONDS, TOTP_WINDOW_STEPS,
};
pub use password_reset::{PASSWORD_RESET_TOKEN_TTL_MINUTES, PasswordResetToken};
pub use session::{SESSION_ABSOLUTE_EXPIRY_DAYS, Session, SessionId};
pub use tenant::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PaginatedResult, Pagination, Tenant};
pub use token::{RefreshToken, RevokedToken, TokenId};
pub use user::{
    AuthTokenType, EmailAddress, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH_WITH_MFA,
    PASSWORD_MIN_LENGTH_WITHOUT_MFA, UserId, validate_password,
};
