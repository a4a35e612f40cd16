//! Tenant entity: the isolation boundary every resource is scoped to.

use aegis_core::TenantId;

/// A tenant account. Identity and session records can never cross this
/// boundary: every repository call takes a bound `TenantId` and scopes its
/// query to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    id: TenantId,
    name: String,
    active: bool,
}

impl Tenant {
    /// Creates a new active tenant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            active: true,
        }
    }

    /// Reconstructs a tenant from persisted fields.
    #[must_use]
    pub fn from_parts(id: TenantId, name: String, active: bool) -> Self {
        Self { id, name, active }
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub fn id(&self) -> TenantId {
        self.id
    }

    /// Returns the tenant's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns whether the tenant can currently authenticate users.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates the tenant, e.g. on suspension or offboarding.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Maximum page size accepted by any paginated, tenant-scoped listing.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Validated pagination parameters for a tenant-scoped listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
}

impl Pagination {
    /// Validates and constructs pagination parameters.
    ///
    /// `page` must be at least 1; `page_size` must be at least 1 and at
    /// most [`MAX_PAGE_SIZE`].
    pub fn new(page: u32, page_size: u32) -> Result<Self, aegis_core::AppError> {
        if page < 1 {
            return Err(aegis_core::AppError::Validation(
                "page must be at least 1".to_owned(),
            ));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(aegis_core::AppError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self { page, page_size })
    }

    /// Returns the requested page, with the default page size.
    #[must_use]
    pub fn with_default_size(page: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Returns the 1-indexed page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the SQL `OFFSET` for this page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from((self.page - 1) * self.page_size)
    }

    /// Returns the SQL `LIMIT` for this page.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// A page of results alongside enough metadata to render pagination controls.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: i64,
    /// The page this result represents.
    pub page: u32,
    /// The page size used.
    pub page_size: u32,
}

impl<T> PaginatedResult<T> {
    /// Returns the total number of pages, at least 1.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 1;
        }
        let total = u32::try_from(self.total.max(0)).unwrap_or(u32::MAX);
        total.div_ceil(self.page_size).max(1)
    }

    /// Returns whether a next page exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Returns whether a previous page exists.
    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_rejected() {
        assert!(Pagination::new(0, 20).is_err());
    }

    #[test]
    fn page_size_over_max_is_rejected() {
        assert!(Pagination::new(1, MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn valid_pagination_computes_offset() {
        let pagination = Pagination::new(3, 20).unwrap_or_else(|_| panic!("test"));
        assert_eq!(pagination.offset(), 40);
        assert_eq!(pagination.limit(), 20);
    }

    #[test]
    fn paginated_result_reports_next_and_prev() {
        let result = PaginatedResult::<()> {
            items: vec![],
            total: 45,
            page: 2,
            page_size: 20,
        };
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(result.has_prev());
    }
}
