use std::sync::Arc;

use aegis_application::{
    ApiKeyRepository, AuditRepository, LoginAttemptRepository, MfaRepository,
    PasswordResetRepository, RevokedTokenRepository, SessionRepository, TenantRepository,
    TokenRepository, UserRepository,
};
use aegis_infrastructure::{
    PostgresApiKeyRepository, PostgresAuditRepository, PostgresLoginAttemptRepository,
    PostgresMfaRepository, PostgresPasswordResetRepository, PostgresRevokedTokenRepository,
    PostgresSessionRepository, PostgresTenantRepository, PostgresTokenRepository,
    PostgresUserRepository,
};
use sqlx::PgPool;

pub(super) struct RepositorySet {
    pub(super) user_repository: Arc<dyn UserRepository>,
    pub(super) session_repository: Arc<dyn SessionRepository>,
    pub(super) token_repository: Arc<dyn TokenRepository>,
    pub(super) revoked_token_repository: Arc<dyn RevokedTokenRepository>,
    pub(super) login_attempt_repository: Arc<dyn LoginAttemptRepository>,
    pub(super) mfa_repository: Arc<dyn MfaRepository>,
    pub(super) password_reset_repository: Arc<dyn PasswordResetRepository>,
    pub(super) api_key_repository: Arc<dyn ApiKeyRepository>,
    pub(super) tenant_repository: Arc<dyn TenantRepository>,
    pub(super) audit_repository: Arc<dyn AuditRepository>,
}

pub(super) fn build_repository_set(pool: &PgPool) -> RepositorySet {
    RepositorySet {
        user_repository: Arc::new(PostgresUserRepository::new(pool.clone())),
        session_repository: Arc::new(PostgresSessionRepository::new(pool.clone())),
        token_repository: Arc::new(PostgresTokenRepository::new(pool.clone())),
        revoked_token_repository: Arc::new(PostgresRevokedTokenRepository::new(pool.clone())),
        login_attempt_repository: Arc::new(PostgresLoginAttemptRepository::new(pool.clone())),
        mfa_repository: Arc::new(PostgresMfaRepository::new(pool.clone())),
        password_reset_repository: Arc::new(PostgresPasswordResetRepository::new(pool.clone())),
        api_key_repository: Arc::new(PostgresApiKeyRepository::new(pool.clone())),
        tenant_repository: Arc::new(PostgresTenantRepository::new(pool.clone())),
        audit_repository: Arc::new(PostgresAuditRepository::new(pool.clone())),
    }
}
