use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use uuid::Uuid;

use aegis_core::AuthenticatedUser;
use aegis_domain::{SessionId, UserId};

use crate::dto::{LogoutRequest, MeResponse, SessionResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /auth/me - The authenticated principal.
pub async fn me_handler(
    Extension(principal): Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: principal.user_id(),
        tenant_id: principal.tenant_id().as_uuid(),
        email: principal.email().to_owned(),
        session_id: principal.session_id(),
    })
}

/// POST /auth/logout - Terminate the current session, a named session,
/// or every session the user holds.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    payload: Option<Json<LogoutRequest>>,
) -> ApiResult<StatusCode> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();

    // With no explicit target, log out the session the request was
    // authenticated with.
    let session_id = if payload.all_sessions {
        None
    } else {
        Some(SessionId::from_uuid(
            payload.session_id.unwrap_or_else(|| principal.session_id()),
        ))
    };

    state
        .auth_service
        .logout(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            payload.refresh_token.as_deref(),
            session_id,
            payload.all_sessions,
            Utc::now(),
        )
        .await?;

    Ok(StatusCode::OK)
}

/// GET /api/sessions - List the caller's sessions.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = state
        .session_service
        .list_sessions(principal.tenant_id(), UserId::from_uuid(principal.user_id()))
        .await?;

    Ok(Json(
        sessions
            .iter()
            .map(|session| SessionResponse::from_session(session, principal.session_id()))
            .collect(),
    ))
}

/// GET /api/sessions/{session_id} - Look up one of the caller's sessions.
///
/// A session that does not exist and a session owned by someone else both
/// come back 404, so the endpoint cannot be used to probe for session ids.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state
        .session_service
        .get_owned_session(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            SessionId::from_uuid(session_id),
        )
        .await?;

    Ok(Json(SessionResponse::from_session(
        &session,
        principal.session_id(),
    )))
}

/// DELETE /api/sessions/{session_id} - Terminate one of the caller's
/// sessions. Same ownership rule as the lookup: not-yours is a 404.
pub async fn terminate_session_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .auth_service
        .logout(
            principal.tenant_id(),
            UserId::from_uuid(principal.user_id()),
            None,
            Some(SessionId::from_uuid(session_id)),
            false,
            Utc::now(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
