//! Tenant-scoped API key entity for machine-to-machine access.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aegis_core::TenantId;

use crate::user::UserId;

/// Unique identifier for an API key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Creates a new random API key identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as an API key identifier.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

/// A tenant-scoped API key. The raw secret is only ever returned to the
/// caller once, at creation time; persisted state holds only its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    id: ApiKeyId,
    tenant_id: TenantId,
    created_by: UserId,
    key_hash: String,
    prefix: String,
    scopes: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Creates a new, active API key record from its hashed secret.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        created_by: UserId,
        key_hash: String,
        prefix: String,
        scopes: Option<Vec<String>>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: ApiKeyId::new(),
            tenant_id,
            created_by,
            key_hash,
            prefix,
            scopes,
            created_at,
            expires_at,
            revoked_at: None,
        }
    }

    /// Reconstructs an API key record from persisted fields.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ApiKeyId,
        tenant_id: TenantId,
        created_by: UserId,
        key_hash: String,
        prefix: String,
        scopes: Option<Vec<String>>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            created_by,
            key_hash,
            prefix,
            scopes,
            created_at,
            expires_at,
            revoked_at,
        }
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn id(&self) -> ApiKeyId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the user who created this key.
    #[must_use]
    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    /// Returns the hash of the full secret.
    #[must_use]
    pub fn key_hash(&self) -> &str {
        self.key_hash.as_str()
    }

    /// Returns the non-secret display prefix shown in listings.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    /// Returns the granted scope set. `None` means unrestricted.
    #[must_use]
    pub fn scopes(&self) -> Option<&[String]> {
        self.scopes.as_deref()
    }

    /// Returns when the key was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the key's optional expiry.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns when the key was revoked, if ever.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// A key is usable iff not revoked and not past its optional expiry.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }

    /// Revokes the key immediately.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }

    /// Checks whether this key grants the requested scope.
    ///
    /// A key with no scope restriction grants every scope.
    #[must_use]
    pub fn allows_scope(&self, requested: &str) -> bool {
        match &self.scopes {
            Some(granted) => granted.iter().any(|scope| scope == requested),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key(now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey::new(
            TenantId::new(),
            UserId::new(),
            "hash".to_owned(),
            "aegis_3f9c".to_owned(),
            None,
            now,
            expires_at,
        )
    }

    #[test]
    fn unexpired_unrevoked_key_is_active() {
        let now = Utc::now();
        assert!(sample_key(now, None).is_active(now));
    }

    #[test]
    fn revoked_key_is_inactive() {
        let now = Utc::now();
        let mut key = sample_key(now, None);
        key.revoke(now);
        assert!(!key.is_active(now));
    }

    #[test]
    fn expired_key_is_inactive() {
        let now = Utc::now();
        let key = sample_key(now, Some(now - chrono::Duration::seconds(1)));
        assert!(!key.is_active(now));
    }

    #[test]
    fn unscoped_key_allows_any_scope() {
        let now = Utc::now();
        assert!(sample_key(now, None).allows_scope("anything"));
    }

    #[test]
    fn scoped_key_allows_only_its_scopes() {
        let now = Utc::now();
        let key = ApiKey::new(
            TenantId::new(),
            UserId::new(),
            "hash".to_owned(),
            "aegis_3f9c".to_owned(),
            Some(vec!["read".to_owned(), "write".to_owned()]),
            now,
            None,
        );
        assert!(key.allows_scope("read"));
        assert!(key.allows_scope("write"));
        assert!(!key.allows_scope("admin"));
    }
}
