use aegis_application::ACCESS_TOKEN_TTL_MINUTES;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for email/password registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Incoming payload for email/password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// CAPTCHA response token, required once the gate has triggered.
    pub captcha_token: Option<String>,
}

/// Login outcome: a token pair, an MFA challenge, or a CAPTCHA challenge.
///
/// One struct rather than three so the client can branch on the two
/// boolean discriminators without content-sniffing the body shape.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub mfa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_session_token: Option<String>,
    pub captcha_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
}

impl LoginResponse {
    pub fn issued(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_in: Some(ACCESS_TOKEN_TTL_MINUTES * 60),
            mfa_required: false,
            mfa_session_token: None,
            captcha_required: false,
            site_key: None,
        }
    }

    pub fn mfa_challenge(mfa_session_token: String) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_in: None,
            mfa_required: true,
            mfa_session_token: Some(mfa_session_token),
            captcha_required: false,
            site_key: None,
        }
    }

    pub fn captcha_challenge(site_key: Option<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_in: None,
            mfa_required: false,
            mfa_session_token: None,
            captcha_required: true,
            site_key,
        }
    }
}

/// Incoming payload for completing an MFA challenge.
#[derive(Debug, Deserialize)]
pub struct MfaLoginRequest {
    pub mfa_session_token: String,
    pub code: String,
    /// `"totp"` (default) or `"recovery"`.
    pub method: Option<String>,
}

/// Incoming payload for refresh token rotation.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// A freshly issued or rotated token pair.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl TokenPairResponse {
    pub fn new(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_TTL_MINUTES * 60,
        }
    }
}

/// Incoming payload for logout. With no fields set, the current session
/// is terminated.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub all_sessions: bool,
}

/// Incoming payload for an authenticated password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Incoming payload for requesting a password reset email.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Incoming payload for completing a password reset.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}
