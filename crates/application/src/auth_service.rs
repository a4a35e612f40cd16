//! Login orchestration: the state machine wiring together lockout, CAPTCHA,
//! credential verification, MFA branching, and token/session issuance.
//!
//! This is the one service in the crate that depends on most of the others;
//! every other service stays usable standalone (e.g. an admin tool that
//! only needs [`crate::session_service::SessionService`] does not have to
//! pull in CAPTCHA or MFA wiring).

use chrono::{DateTime, Utc};

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{AuditAction, AuditLogEntry, EmailAddress, Session, SessionId, UserId, account_identifier};

use crate::audit_service::AuditService;
use crate::captcha_service::CaptchaService;
use crate::login_attempt_service::LoginAttemptService;
use crate::mfa_service::MfaService;
use crate::session_service::SessionService;
use crate::token_service::TokenService;
use crate::user_service::{UserRecord, UserService};

/// Builds the ledger key used to gate login attempts by source IP,
/// independent of the account identifier, so a credential-stuffing run
/// against many accounts from one address still trips CAPTCHA.
fn ip_identifier(ip_address: &str) -> String {
    format!("ip:{ip_address}")
}

/// Whether a refresh's fingerprint diverges from the session's
/// creation-time one. A session created without a recorded fingerprint
/// (e.g. an internal tool that doesn't forward client headers) never
/// trips this check, since there is nothing to compare against.
fn fingerprint_diverges(session: &Session, ip_address: Option<&str>, user_agent: Option<&str>) -> bool {
    let ip_mismatch = matches!((session.ip_address(), ip_address), (Some(known), Some(seen)) if known != seen);
    let user_agent_mismatch = matches!((session.user_agent(), user_agent), (Some(known), Some(seen)) if known != seen);
    ip_mismatch || user_agent_mismatch
}

/// Input to [`AuthService::login`].
pub struct LoginParams {
    pub tenant_id: TenantId,
    pub email: String,
    pub password: String,
    /// CAPTCHA response token, present once the CAPTCHA gate has triggered.
    pub captcha_token: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Which second-factor credential is presented to complete an MFA
/// challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaChallengeMethod {
    /// A 6-digit TOTP code from the enrolled authenticator.
    Totp,
    /// One of the single-use recovery codes issued at enrollment.
    RecoveryCode,
}

/// Outcome of a successful authentication step, whether completed in one
/// call (`login` with MFA disabled) or two (`login` then `login/mfa`).
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A token pair was issued; the caller is fully authenticated.
    Issued {
        access_token: String,
        refresh_token: String,
        session_id: SessionId,
    },
    /// Credentials were correct but a second factor is required. No session
    /// or tokens exist yet.
    MfaRequired { mfa_session_token: String },
}

/// A freshly rotated token pair.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Application service orchestrating the full login/refresh/logout lifecycle.
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    login_attempts: LoginAttemptService,
    captcha: CaptchaService,
    mfa: MfaService,
    tokens: TokenService,
    sessions: SessionService,
    audit: AuditService,
    require_verified_email: bool,
}

impl AuthService {
    /// Creates a new auth service wiring together the services it orchestrates.
    #[must_use]
    pub fn new(
        users: UserService,
        login_attempts: LoginAttemptService,
        captcha: CaptchaService,
        mfa: MfaService,
        tokens: TokenService,
        sessions: SessionService,
        audit: AuditService,
    ) -> Self {
        Self {
            users,
            login_attempts,
            captcha,
            mfa,
            tokens,
            sessions,
            audit,
            require_verified_email: false,
        }
    }

    /// Rejects logins from accounts whose email is not yet verified, with
    /// the same uniform invalid-credentials error as a wrong password.
    /// Evaluated only after password verification, so the timing
    /// discipline of the unknown-user path is unaffected.
    #[must_use]
    pub fn with_email_verification_required(mut self) -> Self {
        self.require_verified_email = true;
        self
    }

    /// Verifies credentials with constant-time discipline: an unknown user
    /// and a known user with a wrong password take the same code path, so a
    /// timing side channel cannot distinguish them.
    ///
    /// On success, opportunistically rehashes the password if the stored
    /// verifier uses weaker parameters than the hasher's current config.
    async fn authenticate(&self, tenant_id: TenantId, email: &EmailAddress, password: &str) -> AppResult<Option<UserRecord>> {
        let user_repository = self.users.user_repository();
        let password_hasher = self.users.password_hasher();

        let Some(user) = user_repository.find_by_email(tenant_id, email.as_str()).await? else {
            let _ = password_hasher.verify_password(password, password_hasher.dummy_hash());
            return Ok(None);
        };

        let verified = password_hasher.verify_password(password, &user.password_hash)?;
        if !verified || !user.active {
            return Ok(None);
        }

        if self.require_verified_email && !user.email_verified {
            return Ok(None);
        }

        if password_hasher.needs_rehash(&user.password_hash) {
            let new_hash = password_hasher.hash_password(password)?;
            user_repository.update_password(user.id, &new_hash).await?;
        }

        Ok(Some(user))
    }

    /// Runs the full login state machine: lockout check, CAPTCHA gate,
    /// credential verification, and MFA branching.
    pub async fn login(&self, params: LoginParams, now: DateTime<Utc>) -> AppResult<LoginOutcome> {
        let email_address = EmailAddress::new(&params.email)?;
        let identifier = account_identifier(&email_address, params.tenant_id);

        let gate = match self.login_attempts.check_gate(&identifier, now).await {
            Ok(gate) => gate,
            Err(error @ AppError::AccountLocked { .. }) => {
                self.audit(params.tenant_id, None, AuditAction::LoginLockedOut, &params, false, now).await?;
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        // The account identifier and the source IP are gated independently: a
        // spray attack against many accounts from one IP racks up failures
        // keyed by IP long before any single account crosses its own
        // threshold, so CAPTCHA must trigger off either ledger.
        let ip_identifier = params.ip_address.as_deref().map(ip_identifier);
        let ip_requires_captcha = match &ip_identifier {
            Some(ip_identifier) => self.login_attempts.check_gate(ip_identifier, now).await?.captcha_required,
            None => false,
        };
        let captcha_required = gate.captcha_required || ip_requires_captcha;

        if let Err(error) = self
            .captcha
            .verify_if_required(params.captcha_token.as_deref(), params.ip_address.as_deref(), captcha_required)
            .await
        {
            self.audit(params.tenant_id, None, AuditAction::LoginCaptchaRequired, &params, false, now).await?;
            return Err(error);
        }

        let Some(user) = self.authenticate(params.tenant_id, &email_address, &params.password).await? else {
            // The attempt ledger is best-effort: losing one row skews the
            // lockout window slightly, which is better than turning a
            // failed login into a 500.
            if let Err(error) = self.login_attempts.record_failure(&identifier, params.ip_address.clone(), params.user_agent.clone(), now).await {
                tracing::warn!(%error, "failed to record login attempt");
            }
            if let Some(ip_identifier) = &ip_identifier {
                if let Err(error) = self.login_attempts.record_failure(ip_identifier, params.ip_address.clone(), params.user_agent.clone(), now).await {
                    tracing::warn!(%error, "failed to record login attempt by ip");
                }
            }
            self.audit(params.tenant_id, None, AuditAction::LoginFailed, &params, false, now).await?;
            return Err(AppError::Unauthorized("invalid credentials".to_owned()));
        };

        if user.totp_enabled {
            let mfa_session_token = self.tokens.issue_mfa_session(user.id, params.tenant_id, now)?;
            self.audit(params.tenant_id, Some(user.id), AuditAction::MfaChallengeIssued, &params, true, now).await?;
            return Ok(LoginOutcome::MfaRequired { mfa_session_token });
        }

        self.issue(&user, &identifier, params.ip_address, params.user_agent, now).await
    }

    /// Completes an MFA challenge started by [`Self::login`], returning a
    /// token pair on success.
    ///
    /// A recovery code is consumed on a successful match even if a later
    /// step of this call fails; single-use means single-presentation, not
    /// single-successful-login.
    pub async fn complete_mfa_challenge(
        &self,
        tenant_id: TenantId,
        mfa_session_token: &str,
        code: &str,
        method: MfaChallengeMethod,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<LoginOutcome> {
        let decoded = self.tokens.verify_mfa_session(mfa_session_token)?;
        if decoded.claims.tenant_id != tenant_id {
            return Err(AppError::Unauthorized("invalid credentials".to_owned()));
        }

        let user_id = decoded.claims.user_id;
        let valid = match method {
            MfaChallengeMethod::Totp => self.mfa.verify_totp(user_id, code).await?,
            MfaChallengeMethod::RecoveryCode => self.mfa.verify_recovery_code(user_id, code).await?,
        };

        if !valid {
            self.audit
                .record(AuditLogEntry::new(
                    tenant_id,
                    Some(user_id.as_uuid()),
                    AuditAction::MfaRejected,
                    ip_address,
                    user_agent,
                    None,
                    false,
                    None,
                    now,
                ))
                .await?;
            return Err(AppError::Unauthorized("invalid credentials".to_owned()));
        }

        let user = self
            .users
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_owned()))?;

        self.audit
            .record(AuditLogEntry::new(tenant_id, Some(user_id.as_uuid()), AuditAction::MfaVerified, None, None, None, true, None, now))
            .await?;

        let email_address = EmailAddress::new(&user.email)?;
        let identifier = account_identifier(&email_address, tenant_id);
        self.issue(&user, &identifier, ip_address, user_agent, now).await
    }

    /// Creates a session and issues a token pair, recording the login
    /// success and the audit trail. The final step of the login state
    /// machine, reached with or without an MFA hop.
    async fn issue(
        &self,
        user: &UserRecord,
        identifier: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<LoginOutcome> {
        let session = self.sessions.create_session(user.tenant_id, user.id, ip_address.clone(), user_agent.clone(), now).await?;
        let (access_token, refresh_token) = self.tokens.issue_pair(&session, &user.email, now).await?;

        if let Err(error) = self.login_attempts.record_success(identifier, ip_address.clone(), user_agent.clone(), now).await {
            tracing::warn!(%error, "failed to record login success");
        }
        self.audit
            .record(AuditLogEntry::new(
                user.tenant_id,
                Some(user.id.as_uuid()),
                AuditAction::LoginSucceeded,
                ip_address,
                user_agent,
                Some(session.id().as_uuid()),
                true,
                None,
                now,
            ))
            .await?;

        Ok(LoginOutcome::Issued { access_token, refresh_token, session_id: session.id() })
    }

    /// Convenience wrapper for the login-path audit entries that share the
    /// same shape, before a session exists.
    async fn audit(
        &self,
        tenant_id: TenantId,
        actor_user_id: Option<UserId>,
        action: AuditAction,
        params: &LoginParams,
        success: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.audit
            .record(AuditLogEntry::new(
                tenant_id,
                actor_user_id.as_ref().map(UserId::as_uuid),
                action,
                params.ip_address.clone(),
                params.user_agent.clone(),
                None,
                success,
                None,
                now,
            ))
            .await
    }

    /// Rotates a presented refresh token, resolving its owning session from
    /// the token's own claims before delegating to [`TokenService::rotate`].
    ///
    /// On replay, audits `token_replay_detected` and propagates
    /// [`AppError::TokenReplay`] unchanged; callers map it to the same
    /// generic 401 as any other invalid refresh token, per the error
    /// design, so an attacker cannot distinguish replay from garden-variety
    /// invalidity.
    ///
    /// `ip_address`/`user_agent` are the fingerprint of the *presenting*
    /// request; when they diverge from the session's creation-time
    /// fingerprint, `session.hijack_suspected` is audited but the refresh
    /// still succeeds; this is a detection signal for review, not an
    /// enforcement point.
    pub async fn refresh(
        &self,
        presented_raw: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<RefreshedTokens> {
        let (claims, _record) = self.tokens.inspect_refresh(presented_raw).await?;

        let session = self
            .sessions
            .get_owned_session(claims.tenant_id, claims.user_id, claims.session_id)
            .await?;

        if fingerprint_diverges(&session, ip_address, user_agent) {
            self.audit
                .record(AuditLogEntry::new(
                    claims.tenant_id,
                    Some(claims.user_id.as_uuid()),
                    AuditAction::SessionHijackSuspected,
                    ip_address.map(str::to_owned),
                    user_agent.map(str::to_owned),
                    Some(claims.session_id.as_uuid()),
                    true,
                    None,
                    now,
                ))
                .await?;
        }

        let rotation_result = self.tokens.rotate(presented_raw, &session, &claims.email, now).await;

        match rotation_result {
            Ok((access_token, refresh_token)) => {
                self.sessions.touch_session(session, now).await?;
                self.audit
                    .record(AuditLogEntry::new(
                        claims.tenant_id,
                        Some(claims.user_id.as_uuid()),
                        AuditAction::TokenRefreshed,
                        None,
                        None,
                        Some(claims.session_id.as_uuid()),
                        true,
                        None,
                        now,
                    ))
                    .await?;
                Ok(RefreshedTokens { access_token, refresh_token })
            }
            Err(AppError::TokenReplay) => {
                tracing::warn!(user_id = %claims.user_id, jti = %claims.jti, "refresh token replay detected, all tokens for the user were revoked");
                self.audit
                    .record(AuditLogEntry::new(
                        claims.tenant_id,
                        Some(claims.user_id.as_uuid()),
                        AuditAction::TokenReplayDetected,
                        None,
                        None,
                        Some(claims.session_id.as_uuid()),
                        false,
                        None,
                        now,
                    ))
                    .await?;
                Err(AppError::TokenReplay)
            }
            Err(error) => Err(error),
        }
    }

    /// Logs out: revokes the presented refresh token (if any), a single
    /// session (if `session_id` is given), or every session and refresh
    /// token belonging to the user (if `all_sessions` is set).
    pub async fn logout(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        refresh_token: Option<&str>,
        session_id: Option<SessionId>,
        all_sessions: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(raw) = refresh_token {
            if let Ok((claims, _record)) = self.tokens.inspect_refresh(raw).await {
                self.tokens.revoke(claims.jti, now).await?;
            }
        }

        if all_sessions {
            self.sessions.revoke_all_sessions(tenant_id, user_id, now).await?;
            self.tokens.revoke_all_for_user(tenant_id, user_id, now).await?;
            self.audit
                .record(AuditLogEntry::new(
                    tenant_id,
                    Some(user_id.as_uuid()),
                    AuditAction::SessionsMassInvalidated,
                    None,
                    None,
                    None,
                    true,
                    None,
                    now,
                ))
                .await?;
        } else if let Some(session_id) = session_id {
            self.sessions.revoke_session(tenant_id, user_id, session_id, now).await?;
            self.audit
                .record(AuditLogEntry::new(
                    tenant_id,
                    Some(user_id.as_uuid()),
                    AuditAction::SessionTerminated,
                    None,
                    None,
                    Some(session_id.as_uuid()),
                    true,
                    None,
                    now,
                ))
                .await?;
        }

        Ok(())
    }

    /// Changes a user's password and revokes every other active session, so
    /// a stolen session cannot survive a password change.
    pub async fn change_password(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        except_session_id: Option<SessionId>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.users.change_password(tenant_id, user_id, current_password, new_password).await?;

        match except_session_id {
            Some(except) => {
                self.sessions.revoke_all_except(tenant_id, user_id, except, now).await?;
            }
            None => {
                self.sessions.revoke_all_sessions(tenant_id, user_id, now).await?;
            }
        }
        self.tokens.revoke_all_for_user(tenant_id, user_id, now).await?;

        self.audit
            .record(AuditLogEntry::new(tenant_id, Some(user_id.as_uuid()), AuditAction::PasswordChanged, None, None, None, true, None, now))
            .await
    }
}

impl std::fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginParams")
            .field("tenant_id", &self.tenant_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use aegis_domain::{
        ApiKey, ApiKeyId, LoginAttempt, MfaRecoveryCode, MfaSecret, RefreshToken, RevokedToken, TokenId,
    };

    use super::*;
    use crate::captcha_service::CaptchaService;
    use crate::login_attempt_service::LoginAttemptRepository;
    use crate::mfa_service::{MfaRepository, SecretEncryptor, TotpProvider};
    use crate::session_service::SessionRepository;
    use crate::token_service::{
        AccessClaims, DecodedAccessToken, DecodedMfaSessionToken, DecodedRefreshToken, MfaSessionClaims, RefreshClaims, TokenCodec,
        TokenRepository,
    };
    use crate::user_service::{PasswordHasher, RegisterParams, UserRepository};

    struct FakeUserRepository {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UserRepository for FakeUserRepository {
        async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> AppResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap_or_else(|p| p.into_inner()).iter().find(|u| u.tenant_id == tenant_id && u.email == email).cloned())
        }

        async fn find_by_id(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap_or_else(|p| p.into_inner()).iter().find(|u| u.tenant_id == tenant_id && u.id == user_id).cloned())
        }

        async fn create(&self, tenant_id: TenantId, email: &str, password_hash: &str, email_verified: bool) -> AppResult<UserId> {
            let id = UserId::new();
            self.users.lock().unwrap_or_else(|p| p.into_inner()).push(UserRecord {
                id,
                tenant_id,
                email: email.to_owned(),
                email_verified,
                active: true,
                password_hash: password_hash.to_owned(),
                totp_enabled: false,
            });
            Ok(id)
        }

        async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
                user.password_hash = password_hash.to_owned();
            }
            Ok(())
        }

        async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
                user.email_verified = true;
            }
            Ok(())
        }

        async fn set_totp_enabled(&self, user_id: UserId, enabled: bool) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
                user.totp_enabled = enabled;
            }
            Ok(())
        }
    }

    struct PlaintextHasher;

    impl PasswordHasher for PlaintextHasher {
        fn hash_password(&self, password: &str) -> AppResult<String> {
            Ok(format!("plain:{password}"))
        }

        fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("plain:{password}"))
        }

        fn needs_rehash(&self, _hash: &str) -> bool {
            false
        }

        fn dummy_hash(&self) -> &str {
            "plain:dummy-does-not-match-anything"
        }
    }

    struct InMemoryLoginAttemptRepository {
        attempts: Mutex<Vec<LoginAttempt>>,
    }

    #[async_trait]
    impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
        async fn record(&self, attempt: LoginAttempt) -> AppResult<()> {
            self.attempts.lock().unwrap_or_else(|p| p.into_inner()).push(attempt);
            Ok(())
        }

        async fn count_recent_failures(&self, identifier: &str, since: DateTime<Utc>) -> AppResult<i64> {
            Ok(self
                .attempts
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .filter(|a| a.identifier() == identifier && !a.success() && a.attempted_at() >= since)
                .count() as i64)
        }

        async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
            Ok(0)
        }
    }

    struct FakeSessionRepository {
        sessions: Mutex<Vec<Session>>,
    }

    #[async_trait]
    impl SessionRepository for FakeSessionRepository {
        async fn create(&self, session: &Session) -> AppResult<()> {
            self.sessions.lock().unwrap_or_else(|p| p.into_inner()).push(session.clone());
            Ok(())
        }

        async fn find_for_user(&self, tenant_id: TenantId, user_id: UserId, session_id: SessionId) -> AppResult<Option<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .find(|s| s.tenant_id() == tenant_id && s.user_id() == user_id && s.id() == session_id)
                .cloned())
        }

        async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .filter(|s| s.tenant_id() == tenant_id && s.user_id() == user_id)
                .cloned()
                .collect())
        }

        async fn count_active_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<usize> {
            Ok(self
                .sessions
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .filter(|s| s.tenant_id() == tenant_id && s.user_id() == user_id && s.is_active(now))
                .count())
        }

        async fn oldest_active_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<Option<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .filter(|s| s.tenant_id() == tenant_id && s.user_id() == user_id && s.is_active(now))
                .min_by_key(|s| s.last_seen_at())
                .cloned())
        }

        async fn save(&self, session: &Session) -> AppResult<()> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(existing) = sessions.iter_mut().find(|s| s.id() == session.id()) {
                *existing = session.clone();
            }
            Ok(())
        }

        async fn revoke_all_for_user(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
            let mut count = 0u64;
            for session in sessions.iter_mut() {
                if session.tenant_id() == tenant_id && session.user_id() == user_id && session.is_active(at) {
                    session.revoke(at);
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
            let before_count = sessions.len();
            sessions.retain(|s| s.absolute_expiry() >= before);
            Ok((before_count - sessions.len()) as u64)
        }
    }

    struct RealisticCodec;

    impl TokenCodec for RealisticCodec {
        fn encode_access(&self, claims: &AccessClaims) -> AppResult<String> {
            Ok(format!("access:{}:{}", claims.session_id, claims.email))
        }

        fn encode_refresh(&self, claims: &RefreshClaims) -> AppResult<String> {
            Ok(format!("refresh:{}:{}:{}:{}", claims.jti, claims.user_id, claims.tenant_id, claims.email))
        }

        fn encode_mfa_session(&self, claims: &MfaSessionClaims) -> AppResult<String> {
            Ok(format!("mfa:{}:{}:{}", claims.jti, claims.user_id, claims.tenant_id))
        }

        fn decode_access(&self, _token: &str) -> AppResult<DecodedAccessToken> {
            unimplemented!("not exercised in these tests")
        }

        fn decode_refresh(&self, token: &str) -> AppResult<DecodedRefreshToken> {
            let parts: Vec<&str> = token.splitn(5, ':').collect();
            let [_, jti, user_id, tenant_id, email] = parts[..] else {
                return Err(AppError::Unauthorized("malformed refresh token".to_owned()));
            };
            Ok(DecodedRefreshToken {
                claims: RefreshClaims {
                    jti: TokenId::from_uuid(jti.parse().map_err(|_| AppError::Unauthorized("bad jti".to_owned()))?),
                    user_id: UserId::from_uuid(user_id.parse().map_err(|_| AppError::Unauthorized("bad user".to_owned()))?),
                    tenant_id: TenantId::from_uuid(tenant_id.parse().map_err(|_| AppError::Unauthorized("bad tenant".to_owned()))?),
                    email: email.to_owned(),
                    session_id: SessionId::from_uuid(uuid::Uuid::nil()),
                    issued_at: Utc::now(),
                    expires_at: Utc::now(),
                },
                raw: token.to_owned(),
            })
        }

        fn decode_mfa_session(&self, token: &str) -> AppResult<DecodedMfaSessionToken> {
            let parts: Vec<&str> = token.splitn(4, ':').collect();
            let [_, jti, user_id, tenant_id] = parts[..] else {
                return Err(AppError::Unauthorized("malformed mfa token".to_owned()));
            };
            Ok(DecodedMfaSessionToken {
                claims: MfaSessionClaims {
                    jti: TokenId::from_uuid(jti.parse().map_err(|_| AppError::Unauthorized("bad jti".to_owned()))?),
                    user_id: UserId::from_uuid(user_id.parse().map_err(|_| AppError::Unauthorized("bad user".to_owned()))?),
                    tenant_id: TenantId::from_uuid(tenant_id.parse().map_err(|_| AppError::Unauthorized("bad tenant".to_owned()))?),
                    issued_at: Utc::now(),
                    expires_at: Utc::now() + chrono::Duration::minutes(5),
                },
            })
        }
    }

    struct FakeTokenRepository {
        rows: Mutex<Vec<RefreshToken>>,
    }

    #[async_trait]
    impl TokenRepository for FakeTokenRepository {
        async fn create(&self, token: &RefreshToken) -> AppResult<()> {
            self.rows.lock().unwrap_or_else(|p| p.into_inner()).push(token.clone());
            Ok(())
        }

        async fn find_by_jti(&self, jti: TokenId) -> AppResult<Option<RefreshToken>> {
            Ok(self.rows.lock().unwrap_or_else(|p| p.into_inner()).iter().find(|r| r.jti() == jti).cloned())
        }

        async fn save(&self, token: &RefreshToken) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(existing) = rows.iter_mut().find(|r| r.jti() == token.jti()) {
                *existing = token.clone();
            }
            Ok(())
        }

        async fn mark_all_used_for_user(&self, _tenant_id: TenantId, _user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
            let mut count = 0u64;
            for row in rows.iter_mut() {
                if row.used_at().is_none() {
                    let jti = row.jti();
                    row.mark_used(jti, at);
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
            let before_count = rows.len();
            rows.retain(|r| r.expires_at() >= before);
            Ok((before_count - rows.len()) as u64)
        }
    }

    struct FakeRevokedRepository {
        jtis: Mutex<std::collections::HashSet<TokenId>>,
    }

    #[async_trait]
    impl crate::token_service::RevokedTokenRepository for FakeRevokedRepository {
        async fn add(&self, revoked: RevokedToken) -> AppResult<()> {
            self.jtis.lock().unwrap_or_else(|p| p.into_inner()).insert(revoked.jti());
            Ok(())
        }

        async fn contains(&self, jti: TokenId) -> AppResult<bool> {
            Ok(self.jtis.lock().unwrap_or_else(|p| p.into_inner()).contains(&jti))
        }

        async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
            Ok(0)
        }
    }

    struct FakeMfaRepository {
        secrets: Mutex<std::collections::HashMap<UserId, MfaSecret>>,
        recovery_codes: Mutex<std::collections::HashMap<UserId, Vec<MfaRecoveryCode>>>,
    }

    impl FakeMfaRepository {
        fn new() -> Self {
            Self { secrets: Mutex::new(std::collections::HashMap::new()), recovery_codes: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    #[async_trait]
    impl MfaRepository for FakeMfaRepository {
        async fn find_secret(&self, user_id: UserId) -> AppResult<Option<MfaSecret>> {
            Ok(self.secrets.lock().unwrap_or_else(|p| p.into_inner()).get(&user_id).cloned())
        }

        async fn upsert_secret(&self, user_id: UserId, secret: &MfaSecret) -> AppResult<()> {
            self.secrets.lock().unwrap_or_else(|p| p.into_inner()).insert(user_id, secret.clone());
            Ok(())
        }

        async fn delete_secret(&self, user_id: UserId) -> AppResult<()> {
            self.secrets.lock().unwrap_or_else(|p| p.into_inner()).remove(&user_id);
            Ok(())
        }

        async fn replace_recovery_codes(&self, user_id: UserId, codes: &[MfaRecoveryCode]) -> AppResult<()> {
            self.recovery_codes.lock().unwrap_or_else(|p| p.into_inner()).insert(user_id, codes.to_vec());
            Ok(())
        }

        async fn find_recovery_codes(&self, user_id: UserId) -> AppResult<Vec<MfaRecoveryCode>> {
            Ok(self.recovery_codes.lock().unwrap_or_else(|p| p.into_inner()).get(&user_id).cloned().unwrap_or_default())
        }

        async fn mark_recovery_code_used(&self, user_id: UserId, code_hash: &str, at: DateTime<Utc>) -> AppResult<bool> {
            let mut map = self.recovery_codes.lock().unwrap_or_else(|p| p.into_inner());
            let Some(codes) = map.get_mut(&user_id) else {
                return Ok(false);
            };
            let Some(entry) = codes.iter_mut().find(|c| c.code_hash() == code_hash && !c.is_used()) else {
                return Ok(false);
            };
            entry.mark_used(at);
            Ok(true)
        }
    }

    struct FakeTotpProvider {
        accepted_code: String,
        counter: i64,
    }

    impl TotpProvider for FakeTotpProvider {
        fn generate_secret(&self, _email: &str) -> AppResult<crate::mfa_service::GeneratedTotpSecret> {
            Ok(crate::mfa_service::GeneratedTotpSecret {
                secret_bytes: vec![1, 2, 3, 4],
                base32: "BASE32SECRET".to_owned(),
                otpauth_uri: "otpauth://totp/test".to_owned(),
                qr_png_base64: "cGxhY2Vob2xkZXI=".to_owned(),
            })
        }

        fn verify_code(&self, _secret_bytes: &[u8], code: &str, _now: DateTime<Utc>) -> AppResult<Option<i64>> {
            Ok((code == self.accepted_code).then_some(self.counter))
        }
    }

    struct PassthroughEncryptor;

    impl SecretEncryptor for PassthroughEncryptor {
        fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>> {
            Ok(plaintext.to_vec())
        }

        fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
    }

    struct FakeAuditRepository {
        entries: Mutex<Vec<AuditLogEntry>>,
    }

    #[async_trait]
    impl crate::audit_service::AuditRepository for FakeAuditRepository {
        async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
            self.entries.lock().unwrap_or_else(|p| p.into_inner()).push(entry.clone());
            Ok(())
        }
    }

    struct Harness {
        auth: AuthService,
        user_repository: Arc<FakeUserRepository>,
        audit_repository: Arc<FakeAuditRepository>,
    }

    fn harness() -> Harness {
        harness_with(false)
    }

    fn harness_with(require_verified_email: bool) -> Harness {
        let user_repository = Arc::new(FakeUserRepository { users: Mutex::new(Vec::new()) });
        let users = UserService::new(user_repository.clone(), Arc::new(PlaintextHasher));

        let login_attempts = LoginAttemptService::new(Arc::new(InMemoryLoginAttemptRepository { attempts: Mutex::new(Vec::new()) }));
        let mfa_lockout = LoginAttemptService::new(Arc::new(InMemoryLoginAttemptRepository { attempts: Mutex::new(Vec::new()) }));

        let captcha = CaptchaService::disabled();

        let mfa = MfaService::new(
            Arc::new(FakeMfaRepository::new()),
            user_repository.clone(),
            Arc::new(PlaintextHasher),
            Arc::new(FakeTotpProvider { accepted_code: "123456".to_owned(), counter: 1 }),
            Arc::new(PassthroughEncryptor),
            mfa_lockout,
        );

        let tokens = TokenService::new(
            Arc::new(RealisticCodec),
            Arc::new(FakeTokenRepository { rows: Mutex::new(Vec::new()) }),
            Arc::new(FakeRevokedRepository { jtis: Mutex::new(std::collections::HashSet::new()) }),
        );

        let sessions = SessionService::new(Arc::new(FakeSessionRepository { sessions: Mutex::new(Vec::new()) }));

        let audit_repository = Arc::new(FakeAuditRepository { entries: Mutex::new(Vec::new()) });
        let audit = AuditService::new(audit_repository.clone());

        let mut auth = AuthService::new(users, login_attempts, captcha, mfa, tokens, sessions, audit);
        if require_verified_email {
            auth = auth.with_email_verification_required();
        }
        Harness { auth, user_repository, audit_repository }
    }

    async fn seed_user(harness: &Harness, tenant_id: TenantId, email: &str, password: &str, totp_enabled: bool) -> UserId {
        let hash = format!("plain:{password}");
        let id = harness.user_repository.create(tenant_id, email, &hash, true).await.unwrap_or_else(|_| panic!("test"));
        if totp_enabled {
            harness.user_repository.set_totp_enabled(id, true).await.unwrap_or_else(|_| panic!("test"));
        }
        id
    }

    fn login_params(tenant_id: TenantId, email: &str, password: &str) -> LoginParams {
        LoginParams {
            tenant_id,
            email: email.to_owned(),
            password: password.to_owned(),
            captcha_token: None,
            ip_address: Some("203.0.113.7".to_owned()),
            user_agent: Some("test-agent".to_owned()),
        }
    }

    #[tokio::test]
    async fn successful_login_without_mfa_issues_tokens() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;

        let outcome = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), Utc::now()).await.unwrap_or_else(|_| panic!("test"));

        match outcome {
            LoginOutcome::Issued { access_token, refresh_token, .. } => {
                assert!(!access_token.is_empty());
                assert!(!refresh_token.is_empty());
            }
            LoginOutcome::MfaRequired { .. } => panic!("expected issued tokens"),
        }

        let entries = harness.audit_repository.entries.lock().unwrap_or_else(|p| p.into_inner());
        assert!(entries.iter().any(|e| e.action() == AuditAction::LoginSucceeded));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_and_recorded() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;

        let result = harness.auth.login(login_params(tenant_id, "alice@example.com", "wrong-password"), Utc::now()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let entries = harness.audit_repository.entries.lock().unwrap_or_else(|p| p.into_inner());
        assert!(entries.iter().any(|e| e.action() == AuditAction::LoginFailed));
    }

    #[tokio::test]
    async fn unverified_email_fails_closed_when_verification_is_required() {
        let harness = harness_with(true);
        let tenant_id = TenantId::new();
        harness
            .user_repository
            .create(tenant_id, "alice@example.com", "plain:correct-password", false)
            .await
            .unwrap_or_else(|_| panic!("test"));

        let result = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), Utc::now()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn unverified_email_may_log_in_when_verification_is_not_required() {
        let harness = harness();
        let tenant_id = TenantId::new();
        harness
            .user_repository
            .create(tenant_id, "alice@example.com", "plain:correct-password", false)
            .await
            .unwrap_or_else(|_| panic!("test"));

        let result = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), Utc::now()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unknown_email_is_rejected_same_as_wrong_password() {
        let harness = harness();
        let tenant_id = TenantId::new();

        let result = harness.auth.login(login_params(tenant_id, "ghost@example.com", "whatever"), Utc::now()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn five_failures_lock_the_account() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;
        let now = Utc::now();

        for _ in 0..5 {
            let _ = harness.auth.login(login_params(tenant_id, "alice@example.com", "wrong-password"), now).await;
        }

        let result = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await;
        assert!(matches!(result, Err(AppError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn mfa_enabled_user_gets_challenge_then_issues_tokens_on_valid_code() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", true).await;
        let now = Utc::now();

        let outcome = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await.unwrap_or_else(|_| panic!("test"));
        let mfa_session_token = match outcome {
            LoginOutcome::MfaRequired { mfa_session_token } => mfa_session_token,
            LoginOutcome::Issued { .. } => panic!("expected mfa challenge"),
        };

        let completed = harness
            .auth
            .complete_mfa_challenge(tenant_id, &mfa_session_token, "123456", MfaChallengeMethod::Totp, None, None, now)
            .await
            .unwrap_or_else(|_| panic!("test"));
        assert!(matches!(completed, LoginOutcome::Issued { .. }));
    }

    #[tokio::test]
    async fn wrong_mfa_code_is_rejected() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", true).await;
        let now = Utc::now();

        let outcome = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await.unwrap_or_else(|_| panic!("test"));
        let LoginOutcome::MfaRequired { mfa_session_token } = outcome else { panic!("expected mfa challenge") };

        let completed = harness
            .auth
            .complete_mfa_challenge(tenant_id, &mfa_session_token, "000000", MfaChallengeMethod::Totp, None, None, now)
            .await;
        assert!(matches!(completed, Err(AppError::Unauthorized(_))));

        let entries = harness.audit_repository.entries.lock().unwrap_or_else(|poison| poison.into_inner());
        assert!(entries.iter().any(|entry| entry.action() == AuditAction::MfaRejected));
    }

    #[tokio::test]
    async fn refresh_rotates_and_second_presentation_is_rejected() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;
        let now = Utc::now();

        let outcome = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await.unwrap_or_else(|_| panic!("test"));
        let LoginOutcome::Issued { refresh_token, .. } = outcome else { panic!("expected issued tokens") };

        let rotated = harness.auth.refresh(&refresh_token, None, None, now).await.unwrap_or_else(|_| panic!("test"));
        assert_ne!(rotated.refresh_token, refresh_token);

        let replay = harness.auth.refresh(&refresh_token, None, None, now).await;
        assert!(matches!(replay, Err(AppError::TokenReplay)));
    }

    #[tokio::test]
    async fn refresh_from_a_new_ip_is_audited_but_still_succeeds() {
        let harness = harness();
        let tenant_id = TenantId::new();
        seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;
        let now = Utc::now();

        let mut params = login_params(tenant_id, "alice@example.com", "correct-password");
        params.ip_address = Some("203.0.113.7".to_owned());
        let outcome = harness.auth.login(params, now).await.unwrap_or_else(|_| panic!("test"));
        let LoginOutcome::Issued { refresh_token, .. } = outcome else { panic!("expected issued tokens") };

        let rotated = harness.auth.refresh(&refresh_token, Some("198.51.100.9"), None, now).await.unwrap_or_else(|_| panic!("test"));
        assert_ne!(rotated.refresh_token, refresh_token);

        let entries = harness.audit_repository.entries.lock().unwrap_or_else(|poison| poison.into_inner());
        assert!(entries.iter().any(|entry| entry.action() == AuditAction::SessionHijackSuspected));
    }

    #[tokio::test]
    async fn change_password_revokes_other_sessions() {
        let harness = harness();
        let tenant_id = TenantId::new();
        let user_id = seed_user(&harness, tenant_id, "alice@example.com", "correct-password", false).await;
        let now = Utc::now();

        harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await.unwrap_or_else(|_| panic!("test"));

        harness
            .auth
            .change_password(tenant_id, user_id, "correct-password", "a-new-passphrase", None, now)
            .await
            .unwrap_or_else(|_| panic!("test"));

        let login_with_old = harness.auth.login(login_params(tenant_id, "alice@example.com", "correct-password"), now).await;
        assert!(login_with_old.is_err());
    }
}
