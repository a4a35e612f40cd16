use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde::Deserialize;
use uuid::Uuid;

use aegis_core::{AppError, TenantId};
use aegis_domain::{DEFAULT_PAGE_SIZE, Pagination};

use crate::dto::{CreateTenantRequest, TenantListResponse, TenantResponse};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TenantListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// POST /api/tenants - Provision a new tenant.
///
/// Guarded by the operator bootstrap token rather than a user session:
/// tenant provisioning happens before any user of the tenant exists.
pub async fn create_tenant_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantResponse>)> {
    require_bootstrap_token(&state, &headers)?;

    let tenant = state.tenant_service.provision(&payload.name).await?;

    Ok((StatusCode::CREATED, Json(TenantResponse::from(&tenant))))
}

/// GET /api/tenants - List tenants, paginated.
pub async fn list_tenants_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TenantListQuery>,
) -> ApiResult<Json<TenantListResponse>> {
    require_bootstrap_token(&state, &headers)?;

    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    let result = state.tenant_service.list(pagination).await?;

    Ok(Json(TenantListResponse::from(result)))
}

/// DELETE /api/tenants/{tenant_id} - Deactivate a tenant.
pub async fn deactivate_tenant_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_bootstrap_token(&state, &headers)?;

    state
        .tenant_service
        .deactivate(TenantId::from_uuid(tenant_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn require_bootstrap_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let configured = state
        .bootstrap_token
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("tenant provisioning is not enabled".to_owned()))?;

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("bootstrap token is required".to_owned()))?;

    if presented != configured {
        return Err(AppError::Unauthorized("bootstrap token is invalid".to_owned()));
    }

    Ok(())
}
