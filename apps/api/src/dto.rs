mod api_keys;
mod auth;
mod common;
mod mfa;
mod sessions;
mod tenants;

pub use api_keys::{ApiKeyResponse, CreateApiKeyRequest, IssuedApiKeyResponse};
pub use auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    MfaLoginRequest, RefreshRequest, RegisterRequest, ResetPasswordRequest, TokenPairResponse,
};
pub use common::{GenericMessageResponse, HealthDependencyStatus, HealthResponse, MeResponse};
pub use mfa::{
    MfaConfirmRequest, MfaDisableRequest, MfaEnrollmentResponse, RecoveryCodesResponse,
    RegenerateRecoveryCodesRequest,
};
pub use sessions::SessionResponse;
pub use tenants::{CreateTenantRequest, TenantListResponse, TenantResponse};
