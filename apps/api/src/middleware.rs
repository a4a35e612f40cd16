use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use aegis_application::RateLimitRule;
use aegis_core::{AppError, AuthenticatedUser};

use crate::error::ApiResult;
use crate::state::AppState;

/// Requires a valid `Authorization: Bearer <access token>` header and
/// attaches the verified principal to the request.
///
/// The access-token verifier rejects refresh and MFA-session tokens by
/// their `type` claim, so neither can be used as a bearer credential even
/// though all three are signed with the same key.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let bearer = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let decoded = state
        .token_service
        .verify_access(bearer)
        .map_err(|_| AppError::Unauthorized("token is invalid or expired".to_owned()))?;

    let principal = AuthenticatedUser::new(
        decoded.claims.user_id.as_uuid(),
        decoded.claims.tenant_id,
        decoded.claims.email,
        decoded.claims.session_id.as_uuid(),
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Rate limiting middleware for unauthenticated auth endpoints.
///
/// Extracts the client IP from `X-Forwarded-For` or falls back to an
/// opaque key, then checks the rate limit using the provided rule
/// (injected via `Extension<RateLimitRule>`).
///
/// OWASP Credential Stuffing Prevention: limits login, registration,
/// and password reset attempts per IP.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let rule = request
        .extensions()
        .get::<RateLimitRule>()
        .cloned()
        .ok_or_else(|| {
            AppError::Internal(
                "rate limit middleware misconfigured: missing RateLimitRule extension".to_owned(),
            )
        })?;

    let ip = extract_client_ip(&request);
    state.rate_limit_service.check_rate_limit(&rule, &ip).await?;

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Extracts the client IP address from request headers.
///
/// Prefers `X-Forwarded-For` (first entry) for reverse-proxy setups,
/// falls back to `X-Real-Ip`, then to `"unknown"`.
fn extract_client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(|ip| ip.trim().to_owned())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(|ip| ip.trim().to_owned())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    use super::{bearer_token, extract_client_ip};

    #[test]
    fn bearer_token_strips_scheme_and_whitespace() {
        let request = HttpRequest::builder()
            .header("authorization", "Bearer  abc.def.ghi ")
            .body(Body::empty())
            .unwrap_or_else(|_| panic!("test"));
        assert_eq!(bearer_token(&request), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_or_non_bearer_authorization_yields_none() {
        let request = HttpRequest::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap_or_else(|_| panic!("test"));
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap_or_else(|_| panic!("test"));
        assert_eq!(extract_client_ip(&request), "203.0.113.7");
    }

    #[test]
    fn unknown_ip_without_proxy_headers() {
        let request = HttpRequest::builder()
            .body(Body::empty())
            .unwrap_or_else(|_| panic!("test"));
        assert_eq!(extract_client_ip(&request), "unknown");
    }
}
