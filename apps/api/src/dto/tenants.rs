use aegis_domain::{PaginatedResult, Tenant};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for tenant provisioning.
#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
}

/// One tenant.
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

impl From<&Tenant> for TenantResponse {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id().as_uuid(),
            name: tenant.name().to_owned(),
            active: tenant.is_active(),
        }
    }
}

/// A page of tenants.
#[derive(Debug, Serialize)]
pub struct TenantListResponse {
    pub items: Vec<TenantResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl From<PaginatedResult<Tenant>> for TenantListResponse {
    fn from(result: PaginatedResult<Tenant>) -> Self {
        Self {
            items: result.items.iter().map(TenantResponse::from).collect(),
            total: result.total,
            page: result.page,
            page_size: result.page_size,
        }
    }
}
