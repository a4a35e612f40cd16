use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;

use aegis_application::{LoginOutcome, LoginParams, MfaChallengeMethod, RegisterParams};
use aegis_core::{AppError, AuthenticatedUser};
use aegis_domain::{AuditAction, AuditLogEntry, SessionId, UserId};

use crate::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, GenericMessageResponse, LoginRequest,
    LoginResponse, MfaLoginRequest, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    TokenPairResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

use super::session_helpers::{extract_request_context, tenant_id_from_headers};

/// POST /auth/register - Create a new account with email+password.
pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<GenericMessageResponse>)> {
    let tenant_id = tenant_id_from_headers(&headers)?;
    let (ip_address, user_agent) = extract_request_context(&headers);

    let user_id = state
        .user_service
        .register(RegisterParams {
            tenant_id,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    state
        .audit_service
        .record(AuditLogEntry::new(
            tenant_id,
            Some(user_id.as_uuid()),
            AuditAction::UserRegistered,
            ip_address,
            user_agent,
            None,
            true,
            None,
            Utc::now(),
        ))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenericMessageResponse {
            message: "account created".to_owned(),
        }),
    ))
}

/// POST /auth/login - Authenticate with email+password.
///
/// Three successful shapes: a token pair, an MFA challenge, or a CAPTCHA
/// challenge. A CAPTCHA requirement is a 200, not an error: the caller
/// did nothing wrong, it just has to solve a challenge and retry.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let tenant_id = tenant_id_from_headers(&headers)?;
    let (ip_address, user_agent) = extract_request_context(&headers);

    let params = LoginParams {
        tenant_id,
        email: payload.email,
        password: payload.password,
        captcha_token: payload.captcha_token,
        ip_address,
        user_agent,
    };

    match state.auth_service.login(params, Utc::now()).await {
        Ok(LoginOutcome::Issued {
            access_token,
            refresh_token,
            ..
        }) => Ok(Json(LoginResponse::issued(access_token, refresh_token))),
        Ok(LoginOutcome::MfaRequired { mfa_session_token }) => {
            Ok(Json(LoginResponse::mfa_challenge(mfa_session_token)))
        }
        Err(AppError::CaptchaRequired) => Ok(Json(LoginResponse::captcha_challenge(
            state.captcha_site_key.clone(),
        ))),
        Err(error) => Err(error.into()),
    }
}

/// POST /auth/login/mfa - Complete an MFA challenge with a TOTP code or
/// a recovery code.
pub async fn mfa_login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MfaLoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let tenant_id = tenant_id_from_headers(&headers)?;
    let (ip_address, user_agent) = extract_request_context(&headers);

    let method = match payload.method.as_deref() {
        Some("recovery") => MfaChallengeMethod::RecoveryCode,
        _ => MfaChallengeMethod::Totp,
    };

    let outcome = state
        .auth_service
        .complete_mfa_challenge(
            tenant_id,
            &payload.mfa_session_token,
            &payload.code,
            method,
            ip_address,
            user_agent,
            Utc::now(),
        )
        .await?;

    match outcome {
        LoginOutcome::Issued {
            access_token,
            refresh_token,
            ..
        } => Ok(Json(LoginResponse::issued(access_token, refresh_token))),
        // complete_mfa_challenge never re-issues a challenge.
        LoginOutcome::MfaRequired { .. } => Err(AppError::Internal(
            "mfa completion returned another challenge".to_owned(),
        )
        .into()),
    }
}

/// POST /auth/refresh - Rotate a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let (ip_address, user_agent) = extract_request_context(&headers);

    let rotated = state
        .auth_service
        .refresh(
            &payload.refresh_token,
            ip_address.as_deref(),
            user_agent.as_deref(),
            Utc::now(),
        )
        .await?;

    Ok(Json(TokenPairResponse::new(
        rotated.access_token,
        rotated.refresh_token,
    )))
}

/// PUT /api/profile/password - Change password (requires auth).
///
/// Every other session and every refresh token is revoked, so a stolen
/// credential does not survive a password change; the session that
/// performed the change stays alive.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .auth_service
        .change_password(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            &payload.current_password,
            &payload.new_password,
            Some(SessionId::from_uuid(principal.session_id())),
            Utc::now(),
        )
        .await
        .map_err(|error| match error {
            // A wrong current password is a bad request on this endpoint,
            // not a failed authentication: the caller already holds a
            // valid access token.
            AppError::Unauthorized(_) => {
                AppError::Validation("current password is incorrect".to_owned())
            }
            other => other,
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /password-reset/request - Request a password reset email.
///
/// The response is identical whether or not the account exists, and
/// whether or not the hourly request limit was hit, so the endpoint
/// cannot be used to enumerate accounts.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    let tenant_id = tenant_id_from_headers(&headers)?;
    let (ip_address, user_agent) = extract_request_context(&headers);

    state
        .password_reset_service
        .request_reset(tenant_id, &payload.email)
        .await?;

    state
        .audit_service
        .record(AuditLogEntry::new(
            tenant_id,
            None,
            AuditAction::PasswordResetRequested,
            ip_address,
            user_agent,
            None,
            true,
            None,
            Utc::now(),
        ))
        .await?;

    Ok(Json(GenericMessageResponse {
        message: "if that email address is registered, a reset link has been sent".to_owned(),
    }))
}

/// POST /password-reset/confirm - Complete a password reset with the
/// emailed token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    let tenant_id = tenant_id_from_headers(&headers)?;
    let (ip_address, user_agent) = extract_request_context(&headers);

    state
        .password_reset_service
        .complete_reset(tenant_id, &payload.token, &payload.new_password)
        .await?;

    state
        .audit_service
        .record(AuditLogEntry::new(
            tenant_id,
            None,
            AuditAction::PasswordResetCompleted,
            ip_address,
            user_agent,
            None,
            true,
            None,
            Utc::now(),
        ))
        .await?;

    Ok(Json(GenericMessageResponse {
        message: "your password has been reset successfully".to_owned(),
    }))
}
