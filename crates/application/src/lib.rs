//! Application services and ports for the identity and session core.
//!
//! Each module owns one piece of the login/session/tenant lifecycle and
//! exposes a repository port plus a service implementing the business
//! rules against it. [`auth_service::AuthService`] is the one service that
//! depends on most of the others, composing them into the full login,
//! refresh, logout, and password-change flows; everything else stays
//! independently usable (an admin tool that only needs to list sessions
//! does not have to wire up CAPTCHA or MFA).

#![forbid(unsafe_code)]

mod api_key_service;
mod audit_service;
mod auth_service;
mod captcha_service;
mod crypto;
mod login_attempt_service;
mod mfa_service;
mod password_reset_service;
mod rate_limit_service;
mod session_service;
mod tenant_service;
mod token_service;
mod user_service;

pub use api_key_service::{ApiKeyRepository, ApiKeyService, IssuedApiKey, RECOGNIZED_SCOPES};
pub use audit_service::{AuditRepository, AuditService};
pub use auth_service::{AuthService, LoginOutcome, LoginParams, MfaChallengeMethod, RefreshedTokens};
pub use captcha_service::{CaptchaOutcome, CaptchaService, CaptchaVerifier};
pub use crypto::{constant_time_eq, generate_token, hash_token};
pub use login_attempt_service::{GateDecision, LoginAttemptRepository, LoginAttemptService};
pub use mfa_service::{GeneratedTotpSecret, MfaRepository, MfaService, SecretEncryptor, TotpEnrollment, TotpProvider, mfa_lockout_identifier};
pub use password_reset_service::{EmailService, PasswordResetRepository, PasswordResetService, PASSWORD_RESET_MAX_REQUESTS_PER_HOUR};
pub use rate_limit_service::{RateLimitRepository, RateLimitRule, RateLimitService, WindowSnapshot};
pub use session_service::{ConcurrentSessionPolicy, SessionRepository, SessionService};
pub use tenant_service::{TenantRepository, TenantService};
pub use token_service::{
    ACCESS_TOKEN_TTL_MINUTES, AccessClaims, DecodedAccessToken, DecodedMfaSessionToken, DecodedRefreshToken, MFA_SESSION_TTL_MINUTES,
    MfaSessionClaims, REFRESH_TOKEN_TTL_DAYS, RefreshClaims, RevokedTokenRepository, TokenCodec, TokenRepository, TokenService, TokenType,
};
pub use user_service::{PasswordHasher, RegisterParams, UserRecord, UserRepository, UserService};
