use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use uuid::Uuid;

use aegis_core::AuthenticatedUser;
use aegis_domain::{ApiKeyId, AuditAction, AuditLogEntry, UserId};

use crate::dto::{ApiKeyResponse, CreateApiKeyRequest, IssuedApiKeyResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/api-keys - Create a machine credential.
///
/// The raw key appears in this response and nowhere else; listings only
/// ever show the short prefix.
pub async fn create_api_key_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<IssuedApiKeyResponse>)> {
    let now = Utc::now();
    let issued = state
        .api_key_service
        .create_key(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            payload.scopes,
            payload.expires_at,
            now,
        )
        .await?;

    audit_key_event(&state, &principal, &headers, AuditAction::ApiKeyCreated).await?;

    Ok((
        StatusCode::CREATED,
        Json(IssuedApiKeyResponse {
            id: issued.key.id().as_uuid(),
            prefix: issued.key.prefix().to_owned(),
            scopes: issued.key.scopes().map(<[String]>::to_vec),
            expires_at: issued.key.expires_at(),
            api_key: issued.raw_secret,
        }),
    ))
}

/// GET /api/api-keys - List the caller's keys, prefixes only.
pub async fn list_api_keys_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<ApiKeyResponse>>> {
    let keys = state
        .api_key_service
        .list_keys(principal.tenant_id(), UserId::from_uuid(principal.user_id()))
        .await?;

    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// DELETE /api/api-keys/{key_id} - Revoke a key. Revoking an
/// already-revoked key is a no-op; a key owned by someone else is a 404.
pub async fn revoke_api_key_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Path(key_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .api_key_service
        .revoke_key(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            ApiKeyId::from_uuid(key_id),
            Utc::now(),
        )
        .await?;

    audit_key_event(&state, &principal, &headers, AuditAction::ApiKeyRevoked).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn audit_key_event(
    state: &AppState,
    principal: &AuthenticatedUser,
    headers: &HeaderMap,
    action: AuditAction,
) -> ApiResult<()> {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned());
    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

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
