//! Tenant lifecycle: provisioning and listing the isolation boundary every
//! other resource in this crate is scoped to.

use std::sync::Arc;

use async_trait::async_trait;

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{PaginatedResult, Pagination, Tenant};

/// Repository port for tenant persistence.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, tenant: &Tenant) -> AppResult<()>;
    async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>>;
    async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Tenant>>;
    async fn save(&self, tenant: &Tenant) -> AppResult<()>;
}

/// Application service for tenant provisioning and administration.
#[derive(Clone)]
pub struct TenantService {
    repository: Arc<dyn TenantRepository>,
}

impl TenantService {
    /// Creates a new tenant service.
    #[must_use]
    pub fn new(repository: Arc<dyn TenantRepository>) -> Self {
        Self { repository }
    }

    /// Provisions a new active tenant.
    pub async fn provision(&self, name: &str) -> AppResult<Tenant> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("tenant name must not be empty".to_owned()));
        }

        let tenant = Tenant::new(trimmed);
        self.repository.create(&tenant).await?;
        Ok(tenant)
    }

    /// Looks up a tenant by ID.
    pub async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Tenant> {
        self.repository
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("tenant not found".to_owned()))
    }

    /// Lists tenants, paginated.
    pub async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Tenant>> {
        self.repository.list(pagination).await
    }

    /// Deactivates a tenant, e.g. on suspension or offboarding. Does not by
    /// itself revoke existing sessions; callers that need immediate
    /// lockout should also invalidate sessions for every user in the tenant.
    pub async fn deactivate(&self, tenant_id: TenantId) -> AppResult<()> {
        let mut tenant = self.find_by_id(tenant_id).await?;
        tenant.deactivate();
        self.repository.save(&tenant).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FakeRepository {
        tenants: Mutex<Vec<Tenant>>,
    }

    #[async_trait]
    impl TenantRepository for FakeRepository {
        async fn create(&self, tenant: &Tenant) -> AppResult<()> {
            self.tenants.lock().unwrap_or_else(|poison| poison.into_inner()).push(tenant.clone());
            Ok(())
        }

        async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>> {
            Ok(self
                .tenants
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .iter()
                .find(|tenant| tenant.id() == tenant_id)
                .cloned())
        }

        async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Tenant>> {
            let tenants = self.tenants.lock().unwrap_or_else(|poison| poison.into_inner());
            let total = tenants.len() as i64;
            let start = pagination.offset() as usize;
            let items = tenants.iter().skip(start).take(pagination.limit() as usize).cloned().collect();
            Ok(PaginatedResult { items, total, page: pagination.page(), page_size: pagination.page_size() })
        }

        async fn save(&self, tenant: &Tenant) -> AppResult<()> {
            let mut tenants = self.tenants.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(existing) = tenants.iter_mut().find(|existing| existing.id() == tenant.id()) {
                *existing = tenant.clone();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let service = TenantService::new(Arc::new(FakeRepository { tenants: Mutex::new(Vec::new()) }));
        let result = service.provision("   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn provisioned_tenant_is_active_and_findable() {
        let service = TenantService::new(Arc::new(FakeRepository { tenants: Mutex::new(Vec::new()) }));
        let tenant = service.provision("Acme Corp").await.unwrap_or_else(|_| panic!("test"));
        assert!(tenant.is_active());

        let found = service.find_by_id(tenant.id()).await.unwrap_or_else(|_| panic!("test"));
        assert_eq!(found.id(), tenant.id());
    }

    #[tokio::test]
    async fn deactivate_flips_active_flag() {
        let service = TenantService::new(Arc::new(FakeRepository { tenants: Mutex::new(Vec::new()) }));
        let tenant = service.provision("Acme Corp").await.unwrap_or_else(|_| panic!("test"));

        service.deactivate(tenant.id()).await.unwrap_or_else(|_| panic!("test"));

        let found = service.find_by_id(tenant.id()).await.unwrap_or_else(|_| panic!("test"));
        assert!(!found.is_active());
    }

    #[tokio::test]
    async fn list_paginates_results() {
        let service = TenantService::new(Arc::new(FakeRepository { tenants: Mutex::new(Vec::new()) }));
        for index in 0..5 {
            service.provision(&format!("Tenant {index}")).await.unwrap_or_else(|_| panic!("test"));
        }

        let page = service.list(Pagination::new(1, 2).unwrap_or_else(|_| panic!("test"))).await.unwrap_or_else(|_| panic!("test"));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_next());
    }
}
