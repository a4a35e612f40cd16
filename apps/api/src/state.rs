use aegis_application::{
    ApiKeyService, AuditService, AuthService, MfaService, PasswordResetService, RateLimitService,
    SessionService, TenantService, TokenService, UserService,
};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub session_service: SessionService,
    pub token_service: TokenService,
    pub mfa_service: MfaService,
    pub password_reset_service: PasswordResetService,
    pub api_key_service: ApiKeyService,
    pub tenant_service: TenantService,
    pub audit_service: AuditService,
    pub rate_limit_service: RateLimitService,
    /// Site key returned alongside a `captcha_required` login response so
    /// the client can render the widget. Absent when CAPTCHA is disabled.
    pub captcha_site_key: Option<String>,
    pub bootstrap_token: Option<String>,
    pub frontend_url: String,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
    pub redis_required: bool,
}
