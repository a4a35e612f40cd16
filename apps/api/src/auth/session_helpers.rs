use axum::http::HeaderMap;
use aegis_core::{AppError, TenantId};
use uuid::Uuid;

/// Reads the mandatory `X-Tenant-ID` header on tenant-entry calls
/// (login, registration, password reset). Missing or malformed values
/// are a validation error, never an authentication one: the caller has
/// not identified a tenant to authenticate against.
pub(super) fn tenant_id_from_headers(headers: &HeaderMap) -> Result<TenantId, AppError> {
    let raw = headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation("X-Tenant-ID header is required".to_owned()))?;

    let tenant_uuid = Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation("X-Tenant-ID header is not a valid tenant id".to_owned()))?;

    Ok(TenantId::from_uuid(tenant_uuid))
}

pub(super) fn extract_request_context(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    (ip_address, user_agent)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use aegis_core::TenantId;

    use super::{extract_request_context, tenant_id_from_headers};

    #[test]
    fn tenant_header_parses() {
        let tenant_id = TenantId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-tenant-id",
            HeaderValue::from_str(&tenant_id.to_string()).unwrap_or_else(|_| panic!("test")),
        );

        let parsed = tenant_id_from_headers(&headers).unwrap_or_else(|_| panic!("test"));
        assert_eq!(parsed, tenant_id);
    }

    #[test]
    fn missing_tenant_header_is_a_validation_error() {
        let headers = HeaderMap::new();
        assert!(tenant_id_from_headers(&headers).is_err());
    }

    #[test]
    fn malformed_tenant_header_is_a_validation_error() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("not-a-uuid"));
        assert!(tenant_id_from_headers(&headers).is_err());
    }

    #[test]
    fn request_context_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("test-agent/1.0"));

        let (ip_address, user_agent) = extract_request_context(&headers);
        assert_eq!(ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(user_agent.as_deref(), Some("test-agent/1.0"));
    }
}
