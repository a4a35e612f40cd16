use std::sync::Arc;

use aegis_application::{
    ApiKeyService, AuditService, AuthService, LoginAttemptService, MfaService,
    PasswordResetService, RateLimitService, SessionService, TenantService, TokenService,
    UserService,
};
use aegis_core::AppError;
use aegis_infrastructure::{PostgresRateLimitRepository, RedisRateLimitRepository};
use sqlx::PgPool;
use tracing::warn;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::redis::build_redis_client;

mod repositories;
mod security;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let repositories = repositories::build_repository_set(&pool);
    let security = security::build_security_components(config)?;

    let user_service = UserService::new(
        repositories.user_repository.clone(),
        security.password_hasher.clone(),
    );

    // Both lockout ledgers honor test mode: end-to-end suites drive the
    // login flow repeatedly without tripping lockout or CAPTCHA.
    if config.test_mode {
        warn!("APP_ENV=test: login lockout and CAPTCHA gating are disabled");
    }
    let login_attempts = if config.test_mode {
        LoginAttemptService::disabled(repositories.login_attempt_repository.clone())
    } else {
        LoginAttemptService::new(repositories.login_attempt_repository.clone())
    };
    let mfa_lockout = if config.test_mode {
        LoginAttemptService::disabled(repositories.login_attempt_repository.clone())
    } else {
        LoginAttemptService::new(repositories.login_attempt_repository.clone())
    };

    let mfa_service = MfaService::new(
        repositories.mfa_repository,
        repositories.user_repository.clone(),
        security.password_hasher.clone(),
        security.totp_provider,
        security.secret_encryptor,
        mfa_lockout,
    );

    let token_service = TokenService::new(
        security.token_codec,
        repositories.token_repository,
        repositories.revoked_token_repository,
    );

    let mut session_service = SessionService::new(repositories.session_repository);
    if let Some(max_active_sessions) = config.max_active_sessions {
        session_service =
            session_service.with_session_limit(max_active_sessions, config.session_eviction_policy);
    }

    let audit_service = AuditService::new(repositories.audit_repository);

    let mut auth_service = AuthService::new(
        user_service.clone(),
        login_attempts,
        security.captcha_service,
        mfa_service.clone(),
        token_service.clone(),
        session_service.clone(),
        audit_service.clone(),
    );
    if config.email_verification_required {
        auth_service = auth_service.with_email_verification_required();
    }

    let password_reset_service = PasswordResetService::new(
        repositories.user_repository,
        repositories.password_reset_repository,
        security.password_hasher,
        security.email_service,
        session_service.clone(),
        token_service.clone(),
    );

    let rate_limit_service = match &redis_client {
        Some(client) => RateLimitService::new(Arc::new(RedisRateLimitRepository::new(
            client.clone(),
            "aegis",
        ))),
        None => {
            RateLimitService::new(Arc::new(PostgresRateLimitRepository::new(pool.clone())))
        }
    };

    Ok(AppState {
        auth_service,
        user_service,
        session_service,
        token_service,
        mfa_service,
        password_reset_service,
        api_key_service: ApiKeyService::new(repositories.api_key_repository),
        tenant_service: TenantService::new(repositories.tenant_repository),
        audit_service,
        rate_limit_service,
        captcha_site_key: config
            .captcha_provider
            .site_key()
            .map(str::to_owned),
        bootstrap_token: config.bootstrap_token.clone(),
        frontend_url: config.frontend_url.clone(),
        postgres_pool: pool,
        redis_required: redis_client.is_some(),
        redis_client,
    })
}
