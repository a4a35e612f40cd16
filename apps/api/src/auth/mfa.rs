use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;

use aegis_core::AuthenticatedUser;
use aegis_domain::{AuditAction, AuditLogEntry, UserId};

use crate::dto::{
    MfaConfirmRequest, MfaDisableRequest, MfaEnrollmentResponse, RecoveryCodesResponse,
    RegenerateRecoveryCodesRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

use super::session_helpers::extract_request_context;

/// POST /auth/mfa/totp/enroll - Start TOTP enrollment.
///
/// Returns the secret, provisioning QR code, and recovery codes exactly
/// once. MFA is not enforced at login until the enrollment is confirmed.
pub async fn mfa_enroll_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MfaEnrollmentResponse>> {
    let enrollment = state
        .mfa_service
        .start_enrollment(principal.tenant_id(), UserId::from_uuid(principal.user_id()))
        .await?;

    Ok(Json(MfaEnrollmentResponse {
        secret_base32: enrollment.secret_base32,
        otpauth_uri: enrollment.otpauth_uri,
        qr_png_base64: enrollment.qr_png_base64,
        recovery_codes: enrollment.recovery_codes,
    }))
}

/// POST /auth/mfa/totp/confirm - Prove possession of the authenticator
/// and switch MFA enforcement on.
pub async fn mfa_confirm_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<MfaConfirmRequest>,
) -> ApiResult<StatusCode> {
    state
        .mfa_service
        .confirm_enrollment(UserId::from_uuid(principal.user_id()), &payload.code)
        .await?;

    audit_mfa_change(&state, &principal, &headers, AuditAction::MfaEnrolled).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /auth/mfa/totp - Disable TOTP. Requires the current password.
pub async fn mfa_disable_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<MfaDisableRequest>,
) -> ApiResult<StatusCode> {
    state
        .mfa_service
        .disable_totp(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            &payload.password,
        )
        .await?;

    audit_mfa_change(&state, &principal, &headers, AuditAction::MfaDisabled).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/mfa/recovery-codes/regenerate - Replace the recovery code
/// set. Requires the current password; the old codes stop working.
pub async fn mfa_regenerate_recovery_codes_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<RegenerateRecoveryCodesRequest>,
) -> ApiResult<Json<RecoveryCodesResponse>> {
    let recovery_codes = state
        .mfa_service
        .regenerate_recovery_codes(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            &payload.password,
        )
        .await?;

    audit_mfa_change(
        &state,
        &principal,
        &headers,
        AuditAction::MfaRecoveryCodesRegenerated,
    )
    .await?;

    Ok(Json(RecoveryCodesResponse { recovery_codes }))
}

async fn audit_mfa_change(
    state: &AppState,
    principal: &AuthenticatedUser,
    headers: &HeaderMap,
    action: AuditAction,
) -> ApiResult<()> {
    let (ip_address, user_agent) = extract_request_context(headers);
    state
        .audit_service
        .record(AuditLogEntry::new(
            principal.tenant_id(),
            Some(principal.user_id()),
            action,
            ip_address,
            user_agent,
            Some(principal.session_id()),
            true,
            None,
            Utc::now(),
        ))
        .await?;
    Ok(())
}
