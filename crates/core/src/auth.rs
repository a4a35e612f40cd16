use uuid::Uuid;

use crate::TenantId;

/// The principal extracted from a verified access-token JWT.
///
/// Built by the access-token middleware and attached to the request so
/// handlers never need to touch the token or its claims directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    user_id: Uuid,
    tenant_id: TenantId,
    email: String,
    session_id: Uuid,
}

impl AuthenticatedUser {
    /// Creates an authenticated principal from verified token claims.
    #[must_use]
    pub fn new(user_id: Uuid, tenant_id: TenantId, email: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id,
            email: email.into(),
            session_id,
        }
    }

    /// Returns the authenticated user's identifier.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the tenant the access token was scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the user's email as it was at token-issuance time.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the session this access token was minted from.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}
