//! Access and refresh token issuance, verification, and rotation.
//!
//! Access tokens are short-lived JWTs carrying the caller's identity and
//! are never persisted. Refresh tokens are also JWTs (so the bearer value
//! is self-describing and carries its own `jti`), but the server also
//! keeps a row per refresh token: the `jti` is the primary key, and the
//! full presented token string is hashed and compared against
//! `token_hash` on every use. This lets rotation be enforced server-side
//! even though the token itself is stateless-looking at the wire format.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{RefreshToken, RevokedToken, Session, SessionId, TokenId, UserId};

use crate::crypto::{constant_time_eq, hash_token};

/// Default access-token lifetime.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Default refresh-token lifetime.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Default MFA-session-token lifetime, spanning only the MFA challenge step.
pub const MFA_SESSION_TTL_MINUTES: i64 = 5;

/// The purpose a JWT was issued for. Every validator rejects a token whose
/// `type` does not match the use it is being presented for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// A bearer credential for authenticated API calls.
    Access,
    /// A credential exchanged for a new access/refresh token pair.
    Refresh,
    /// A short-lived credential binding a password check to a pending MFA
    /// challenge.
    MfaSession,
}

/// Claims encoded into an access token.
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub session_id: SessionId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Claims encoded into a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshClaims {
    pub jti: TokenId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub session_id: SessionId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Claims encoded into an MFA session token.
#[derive(Debug, Clone)]
pub struct MfaSessionClaims {
    pub jti: TokenId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A decoded and signature-verified access token.
#[derive(Debug, Clone)]
pub struct DecodedAccessToken {
    pub claims: AccessClaims,
}

/// A decoded and signature-verified refresh token.
#[derive(Debug, Clone)]
pub struct DecodedRefreshToken {
    pub claims: RefreshClaims,
    pub raw: String,
}

/// A decoded and signature-verified MFA session token.
#[derive(Debug, Clone)]
pub struct DecodedMfaSessionToken {
    pub claims: MfaSessionClaims,
}

/// Port to the JWS codec. Implementations sign and verify with a fixed
/// algorithm and key, and must reject a token whose `type` claim does not
/// match the decode method called.
pub trait TokenCodec: Send + Sync {
    fn encode_access(&self, claims: &AccessClaims) -> AppResult<String>;
    fn encode_refresh(&self, claims: &RefreshClaims) -> AppResult<String>;
    fn encode_mfa_session(&self, claims: &MfaSessionClaims) -> AppResult<String>;

    fn decode_access(&self, token: &str) -> AppResult<DecodedAccessToken>;
    fn decode_refresh(&self, token: &str) -> AppResult<DecodedRefreshToken>;
    fn decode_mfa_session(&self, token: &str) -> AppResult<DecodedMfaSessionToken>;
}

/// Repository port for persisted refresh token rows.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> AppResult<()>;
    async fn find_by_jti(&self, jti: TokenId) -> AppResult<Option<RefreshToken>>;
    async fn save(&self, token: &RefreshToken) -> AppResult<()>;

    /// Marks every refresh token belonging to a user's sessions as used,
    /// without issuing replacements. Used after replay detection and on
    /// mass session invalidation.
    async fn mark_all_used_for_user(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>) -> AppResult<u64>;

    /// Removes rows that expired before `before`. Intended for periodic
    /// cleanup.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Repository port for the revoked-token blacklist.
#[async_trait]
pub trait RevokedTokenRepository: Send + Sync {
    /// Adds a `jti` to the blacklist. Idempotent: adding the same `jti`
    /// twice must not error.
    async fn add(&self, revoked: RevokedToken) -> AppResult<()>;

    async fn contains(&self, jti: TokenId) -> AppResult<bool>;

    /// Removes blacklist entries whose underlying token would have expired
    /// before `before` anyway.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Application service for issuing, verifying, and rotating tokens.
#[derive(Clone)]
pub struct TokenService {
    codec: Arc<dyn TokenCodec>,
    tokens: Arc<dyn TokenRepository>,
    revoked: Arc<dyn RevokedTokenRepository>,
}

impl TokenService {
    /// Creates a new token service.
    #[must_use]
    pub fn new(codec: Arc<dyn TokenCodec>, tokens: Arc<dyn TokenRepository>, revoked: Arc<dyn RevokedTokenRepository>) -> Self {
        Self { codec, tokens, revoked }
    }

    /// Issues a fresh access/refresh token pair for an active session.
    ///
    /// Rejects outright if the session is already past its absolute
    /// expiry, and truncates the refresh token's lifetime to the
    /// session's ceiling if the default TTL would otherwise exceed it.
    pub async fn issue_pair(&self, session: &Session, email: &str, now: DateTime<Utc>) -> AppResult<(String, String)> {
        if !session.is_active(now) {
            return Err(AppError::SessionAbsolutelyExpired);
        }

        let access_claims = AccessClaims {
            user_id: session.user_id(),
            tenant_id: session.tenant_id(),
            email: email.to_owned(),
            session_id: session.id(),
            issued_at: now,
            expires_at: now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        };
        let access_token = self.codec.encode_access(&access_claims)?;

        let jti = TokenId::new();
        let candidate_expiry = now + Duration::days(REFRESH_TOKEN_TTL_DAYS);
        let expires_at = session.cap_expiry(candidate_expiry);

        let refresh_claims = RefreshClaims {
            jti,
            user_id: session.user_id(),
            tenant_id: session.tenant_id(),
            email: email.to_owned(),
            session_id: session.id(),
            issued_at: now,
            expires_at,
        };
        let refresh_token = self.codec.encode_refresh(&refresh_claims)?;

        let record = RefreshToken::new(jti, session.id(), hash_token(&refresh_token), now, expires_at)?;
        self.tokens.create(&record).await?;

        Ok((access_token, refresh_token))
    }

    /// Issues a short-lived MFA session token after a password check
    /// succeeds but before the MFA challenge is completed.
    pub fn issue_mfa_session(&self, user_id: UserId, tenant_id: TenantId, now: DateTime<Utc>) -> AppResult<String> {
        let claims = MfaSessionClaims {
            jti: TokenId::new(),
            user_id,
            tenant_id,
            issued_at: now,
            expires_at: now + Duration::minutes(MFA_SESSION_TTL_MINUTES),
        };
        self.codec.encode_mfa_session(&claims)
    }

    /// Verifies an MFA session token's signature and type.
    pub fn verify_mfa_session(&self, token: &str) -> AppResult<DecodedMfaSessionToken> {
        self.codec.decode_mfa_session(token)
    }

    /// Verifies an access token's signature, type, and that its `jti` (via
    /// the session) has not been revoked. Access tokens are not themselves
    /// persisted, so this checks liveness at the session, not token, level.
    pub fn verify_access(&self, token: &str) -> AppResult<DecodedAccessToken> {
        self.codec.decode_access(token)
    }

    /// Checks whether a `jti` is revoked: present on the blacklist, or
    /// absent/invalid as a persisted record.
    pub async fn is_revoked(&self, jti: TokenId, now: DateTime<Utc>) -> AppResult<bool> {
        if self.revoked.contains(jti).await? {
            return Ok(true);
        }
        let record = self.tokens.find_by_jti(jti).await?;
        Ok(!record.is_some_and(|token| token.is_valid(now)))
    }

    /// Decodes a presented refresh token and looks up its stored record,
    /// without mutating anything. Used by `auth_service` to resolve the
    /// owning session before deciding whether to rotate it.
    pub async fn inspect_refresh(&self, presented_raw: &str) -> AppResult<(RefreshClaims, RefreshToken)> {
        let decoded = self.codec.decode_refresh(presented_raw)?;
        let record = self
            .tokens
            .find_by_jti(decoded.claims.jti)
            .await?
            .ok_or_else(|| AppError::Unauthorized("refresh token is invalid".to_owned()))?;
        Ok((decoded.claims, record))
    }

    /// Rotates a presented refresh token for a new pair, bound to `session`.
    ///
    /// Replay is strictly a second presentation of a token that was
    /// already consumed: only that marks every refresh token belonging to
    /// the user used and returns [`AppError::TokenReplay`], so callers
    /// can audit-log and force re-authentication. A token that merely
    /// expired, or whose presented value does not hash to the stored
    /// record, is rejected like any other bad credential, with the
    /// user's other tokens left alone.
    pub async fn rotate(&self, presented_raw: &str, session: &Session, email: &str, now: DateTime<Utc>) -> AppResult<(String, String)> {
        let (claims, mut record) = self.inspect_refresh(presented_raw).await?;

        if record.used_at().is_some() {
            self.tokens.mark_all_used_for_user(claims.tenant_id, claims.user_id, now).await?;
            return Err(AppError::TokenReplay);
        }

        let hash_matches = constant_time_eq(record.token_hash().as_bytes(), hash_token(presented_raw).as_bytes());
        if !hash_matches || !record.is_valid(now) {
            return Err(AppError::Unauthorized("refresh token is invalid or expired".to_owned()));
        }

        if self.revoked.contains(claims.jti).await? {
            return Err(AppError::Unauthorized("refresh token has been revoked".to_owned()));
        }

        if !session.is_active(now) {
            return Err(AppError::SessionAbsolutelyExpired);
        }

        let access_claims = AccessClaims {
            user_id: session.user_id(),
            tenant_id: session.tenant_id(),
            email: email.to_owned(),
            session_id: session.id(),
            issued_at: now,
            expires_at: now + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        };
        let access_token = self.codec.encode_access(&access_claims)?;

        let new_jti = TokenId::new();
        let candidate_expiry = now + Duration::days(REFRESH_TOKEN_TTL_DAYS);
        let expires_at = session.cap_expiry(candidate_expiry);

        let refresh_claims = RefreshClaims {
            jti: new_jti,
            user_id: session.user_id(),
            tenant_id: session.tenant_id(),
            email: email.to_owned(),
            session_id: session.id(),
            issued_at: now,
            expires_at,
        };
        let refresh_token = self.codec.encode_refresh(&refresh_claims)?;
        let new_record = RefreshToken::new(new_jti, session.id(), hash_token(&refresh_token), now, expires_at)?;

        record.mark_used(new_jti, now);
        self.tokens.save(&record).await?;
        self.tokens.create(&new_record).await?;

        Ok((access_token, refresh_token))
    }

    /// Revokes a single refresh token outright, e.g. on logout.
    pub async fn revoke(&self, jti: TokenId, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(mut record) = self.tokens.find_by_jti(jti).await? {
            if record.used_at().is_none() {
                record.mark_used(jti, now);
                self.tokens.save(&record).await?;
            }
            self.revoked.add(RevokedToken::new(jti, record.expires_at())).await?;
        }
        Ok(())
    }

    /// Revokes every refresh token belonging to a user, e.g. after a
    /// password change or a detected compromise.
    pub async fn revoke_all_for_user(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> AppResult<u64> {
        self.tokens.mark_all_used_for_user(tenant_id, user_id, now).await
    }

    /// Removes expired refresh token rows and blacklist entries. Intended
    /// for periodic cleanup.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let tokens_removed = self.tokens.cleanup_expired(now).await?;
        let blacklist_removed = self.revoked.cleanup_expired(now).await?;
        Ok(tokens_removed + blacklist_removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// A codec that treats the encoded string as an opaque carrier of its
    /// claims, keyed by an in-memory map, so tests exercise token-service
    /// logic without a real JWT dependency.
    struct FakeCodec {
        refresh_claims: Mutex<std::collections::HashMap<String, RefreshClaims>>,
    }

    impl FakeCodec {
        fn new() -> Self {
            Self { refresh_claims: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    impl TokenCodec for FakeCodec {
        fn encode_access(&self, claims: &AccessClaims) -> AppResult<String> {
            Ok(format!("access:{}", claims.session_id))
        }

        fn encode_refresh(&self, claims: &RefreshClaims) -> AppResult<String> {
            let token = format!("refresh:{}", claims.jti);
            self.refresh_claims.lock().unwrap_or_else(|poison| poison.into_inner()).insert(token.clone(), claims.clone());
            Ok(token)
        }

        fn encode_mfa_session(&self, claims: &MfaSessionClaims) -> AppResult<String> {
            Ok(format!("mfa:{}", claims.jti))
        }

        fn decode_access(&self, _token: &str) -> AppResult<DecodedAccessToken> {
            unimplemented!("not exercised in these tests")
        }

        fn decode_refresh(&self, token: &str) -> AppResult<DecodedRefreshToken> {
            let claims = self
                .refresh_claims
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .get(token)
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("unknown refresh token".to_owned()))?;
            Ok(DecodedRefreshToken { claims, raw: token.to_owned() })
        }

        fn decode_mfa_session(&self, _token: &str) -> AppResult<DecodedMfaSessionToken> {
            unimplemented!("not exercised in these tests")
        }
    }

    struct FakeTokenRepository {
        rows: Mutex<Vec<RefreshToken>>,
    }

    #[async_trait]
    impl TokenRepository for FakeTokenRepository {
        async fn create(&self, token: &RefreshToken) -> AppResult<()> {
            self.rows.lock().unwrap_or_else(|poison| poison.into_inner()).push(token.clone());
            Ok(())
        }

        async fn find_by_jti(&self, jti: TokenId) -> AppResult<Option<RefreshToken>> {
            Ok(self.rows.lock().unwrap_or_else(|poison| poison.into_inner()).iter().find(|row| row.jti() == jti).cloned())
        }

        async fn save(&self, token: &RefreshToken) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(existing) = rows.iter_mut().find(|row| row.jti() == token.jti()) {
                *existing = token.clone();
            }
            Ok(())
        }

        async fn mark_all_used_for_user(&self, _tenant_id: TenantId, _user_id: UserId, at: DateTime<Utc>) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap_or_else(|poison| poison.into_inner());
            let mut count = 0u64;
            for row in rows.iter_mut() {
                if row.used_at().is_none() {
                    let self_jti = row.jti();
                    row.mark_used(self_jti, at);
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap_or_else(|poison| poison.into_inner());
            let before_count = rows.len();
            rows.retain(|row| row.expires_at() >= before);
            Ok((before_count - rows.len()) as u64)
        }
    }

    struct FakeRevokedRepository {
        jtis: Mutex<std::collections::HashSet<TokenId>>,
    }

    #[async_trait]
    impl RevokedTokenRepository for FakeRevokedRepository {
        async fn add(&self, revoked: RevokedToken) -> AppResult<()> {
            self.jtis.lock().unwrap_or_else(|poison| poison.into_inner()).insert(revoked.jti());
            Ok(())
        }

        async fn contains(&self, jti: TokenId) -> AppResult<bool> {
            Ok(self.jtis.lock().unwrap_or_else(|poison| poison.into_inner()).contains(&jti))
        }

        async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
            Ok(0)
        }
    }

    fn service() -> TokenService {
        TokenService::new(
            Arc::new(FakeCodec::new()),
            Arc::new(FakeTokenRepository { rows: Mutex::new(Vec::new()) }),
            Arc::new(FakeRevokedRepository { jtis: Mutex::new(std::collections::HashSet::new()) }),
        )
    }

    fn sample_session(now: DateTime<Utc>) -> Session {
        Session::new(UserId::new(), TenantId::new(), None, None, now)
    }

    #[tokio::test]
    async fn rotation_is_one_shot_and_second_presentation_is_replay() {
        let service = service();
        let now = Utc::now();
        let session = sample_session(now);
        let (_access, refresh) = service.issue_pair(&session, "user@example.com", now).await.unwrap_or_else(|_| panic!("test"));

        let (_access2, refresh2) =
            service.rotate(&refresh, &session, "user@example.com", now).await.unwrap_or_else(|_| panic!("test"));
        assert_ne!(refresh, refresh2);

        let replay_result = service.rotate(&refresh, &session, "user@example.com", now).await;
        assert!(matches!(replay_result, Err(AppError::TokenReplay)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_without_touching_other_tokens() {
        let service = service();
        let now = Utc::now();
        let session = sample_session(now);
        let (_access, stale) = service.issue_pair(&session, "user@example.com", now).await.unwrap_or_else(|_| panic!("test"));

        let later = now + Duration::days(REFRESH_TOKEN_TTL_DAYS);
        let (_access2, live) = service.issue_pair(&session, "user@example.com", later).await.unwrap_or_else(|_| panic!("test"));

        // The first token is past its own expiry but was never used, so
        // this is ordinary invalidity, not replay.
        let probe = later + Duration::hours(1);
        let stale_result = service.rotate(&stale, &session, "user@example.com", probe).await;
        assert!(matches!(stale_result, Err(AppError::Unauthorized(_))));

        let live_result = service.rotate(&live, &session, "user@example.com", probe).await;
        assert!(live_result.is_ok());
    }

    #[tokio::test]
    async fn blacklist_add_is_idempotent() {
        let service = service();
        let jti = TokenId::new();
        let now = Utc::now();
        service.revoked.add(RevokedToken::new(jti, now)).await.unwrap_or_else(|_| panic!("test"));
        service.revoked.add(RevokedToken::new(jti, now)).await.unwrap_or_else(|_| panic!("test"));
        assert!(service.revoked.contains(jti).await.unwrap_or_else(|_| panic!("test")));
    }

    #[tokio::test]
    async fn is_revoked_true_for_unknown_jti() {
        let service = service();
        let unknown = TokenId::new();
        assert!(service.is_revoked(unknown, Utc::now()).await.unwrap_or_else(|_| panic!("test")));
    }
}
