//! PostgreSQL-backed tenant repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use aegis_application::TenantRepository;
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{PaginatedResult, Pagination, Tenant};

/// PostgreSQL implementation of the tenant repository port.
#[derive(Clone)]
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    active: bool,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant::from_parts(TenantId::from_uuid(row.id), row.name, row.active)
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn create(&self, tenant: &Tenant) -> AppResult<()> {
        sqlx::query("INSERT INTO tenants (id, name, active) VALUES ($1, $2, $3)")
            .bind(tenant.id().as_uuid())
            .bind(tenant.name())
            .bind(tenant.is_active())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to create tenant: {error}")))?;

        Ok(())
    }

    async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>("SELECT id, name, active FROM tenants WHERE id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to look up tenant: {error}")))?;

        Ok(row.map(Tenant::from))
    }

    async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Tenant>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count tenants: {error}")))?;

        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, name, active
            FROM tenants
            ORDER BY name ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenants: {error}")))?;

        Ok(PaginatedResult {
            items: rows.into_iter().map(Tenant::from).collect(),
            total,
            page: pagination.page(),
            page_size: pagination.page_size(),
        })
    }

    async fn save(&self, tenant: &Tenant) -> AppResult<()> {
        sqlx::query("UPDATE tenants SET name = $2, active = $3 WHERE id = $1")
            .bind(tenant.id().as_uuid())
            .bind(tenant.name())
            .bind(tenant.is_active())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to save tenant: {error}")))?;

        Ok(())
    }
}
