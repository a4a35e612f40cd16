//! Password reset via a single-use, emailed token.
//!
//! Requesting a reset never reveals whether the email is registered: the
//! caller always gets the same response, and when the account does not
//! exist (or has no password to reset) the service still burns the same
//! wall-clock time hashing a dummy token so a timing side channel cannot
//! distinguish the two cases.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{PasswordResetToken, UserId, validate_password};

use crate::crypto::{generate_token, hash_token};
use crate::session_service::SessionService;
use crate::token_service::TokenService;
use crate::user_service::{PasswordHasher, UserRepository};

/// Maximum number of reset requests a single user may make per hour. Beyond
/// this, further requests are silently dropped: the caller still sees the
/// same uniform success response, so the limit cannot be discovered by
/// probing the response shape.
pub const PASSWORD_RESET_MAX_REQUESTS_PER_HOUR: i64 = 3;

/// Port to the outbound email transport.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends an email. `html_body` is optional; plain-text is always sent.
    async fn send_email(&self, to: &str, subject: &str, text_body: &str, html_body: Option<&str>) -> AppResult<()>;
}

/// Repository port for password-reset tokens.
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, token: &PasswordResetToken) -> AppResult<()>;

    /// Looks up a token by its stored hash.
    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<PasswordResetToken>>;

    async fn save(&self, token: &PasswordResetToken) -> AppResult<()>;

    /// Counts reset tokens issued for a user at or after `since`, used to
    /// rate-limit reset requests regardless of whether they were ever
    /// completed.
    async fn count_recent_for_user(&self, user_id: UserId, since: chrono::DateTime<Utc>) -> AppResult<i64>;

    /// Marks every outstanding (unused) reset token for a user as used, so
    /// completing one reset invalidates every other token that was issued
    /// alongside it.
    async fn invalidate_all_for_user(&self, user_id: UserId, at: chrono::DateTime<Utc>) -> AppResult<u64>;

    async fn cleanup_expired(&self, before: chrono::DateTime<Utc>) -> AppResult<u64>;
}

/// Application service orchestrating password-reset requests and completion.
#[derive(Clone)]
pub struct PasswordResetService {
    user_repository: Arc<dyn UserRepository>,
    reset_repository: Arc<dyn PasswordResetRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    email_service: Arc<dyn EmailService>,
    sessions: SessionService,
    tokens: TokenService,
}

impl PasswordResetService {
    /// Creates a new password-reset service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        reset_repository: Arc<dyn PasswordResetRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        email_service: Arc<dyn EmailService>,
        sessions: SessionService,
        tokens: TokenService,
    ) -> Self {
        Self {
            user_repository,
            reset_repository,
            password_hasher,
            email_service,
            sessions,
            tokens,
        }
    }

    /// Requests a password reset for the given email.
    ///
    /// Always returns `Ok(())` regardless of whether the account exists or
    /// has already hit its hourly request limit, to avoid leaking either
    /// fact through the response.
    pub async fn request_reset(&self, tenant_id: TenantId, email: &str) -> AppResult<()> {
        let Some(user) = self.user_repository.find_by_email(tenant_id, email).await? else {
            let _ = self.password_hasher.hash_password("decoy-password-for-timing-parity");
            return Ok(());
        };

        let now = Utc::now();
        let since = now - chrono::Duration::hours(1);
        let recent = self.reset_repository.count_recent_for_user(user.id, since).await?;
        if recent >= PASSWORD_RESET_MAX_REQUESTS_PER_HOUR {
            return Ok(());
        }

        let raw_token = generate_token(32);
        let token_hash = hash_token(&raw_token);
        let reset_token = PasswordResetToken::new(user.id, token_hash, now);
        self.reset_repository.create(&reset_token).await?;

        let subject = "Reset your password";
        let body = format!(
            "A password reset was requested for your account. Use the following code to \
             reset your password. If you did not request this, you can ignore this email.\n\n{raw_token}"
        );
        self.email_service.send_email(&user.email, subject, &body, None).await?;

        Ok(())
    }

    /// Completes a password reset, given the raw token emailed to the user.
    ///
    /// On success, revokes every session and refresh token the user holds
    /// and invalidates every other outstanding reset token, so a password
    /// reset closes out any access an attacker may have already obtained.
    pub async fn complete_reset(&self, tenant_id: TenantId, raw_token: &str, new_password: &str) -> AppResult<()> {
        let token_hash = hash_token(raw_token);
        let mut token = self
            .reset_repository
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::Unauthorized("reset token is invalid or expired".to_owned()))?;

        if !token.is_valid(Utc::now()) {
            return Err(AppError::Unauthorized("reset token is invalid or expired".to_owned()));
        }

        let user = self
            .user_repository
            .find_by_id(tenant_id, token.user_id())
            .await?
            .ok_or_else(|| AppError::Unauthorized("reset token is invalid or expired".to_owned()))?;

        validate_password(new_password, user.totp_enabled)?;

        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.user_repository.update_password(user.id, &new_hash).await?;

        let now = Utc::now();
        token.mark_used(now);
        self.reset_repository.save(&token).await?;
        self.reset_repository.invalidate_all_for_user(user.id, now).await?;

        self.sessions.revoke_all_sessions(tenant_id, user.id, now).await?;
        self.tokens.revoke_all_for_user(tenant_id, user.id, now).await?;

        Ok(())
    }

    /// Removes expired, unconsumed reset tokens. Intended for periodic cleanup.
    pub async fn cleanup(&self, now: chrono::DateTime<Utc>) -> AppResult<u64> {
        self.reset_repository.cleanup_expired(now).await
    }
}
