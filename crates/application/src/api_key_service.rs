//! API key lifecycle for machine-to-machine access within a tenant.
//!
//! Like sessions, API key lookups always scope by tenant and owner in one
//! query so an attacker probing another user's key IDs cannot distinguish
//! "not found" from "not yours".

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{ApiKey, ApiKeyId, UserId};

use crate::crypto::{generate_token, hash_token};

/// Fixed literal prefix every issued key starts with, so a key found in a
/// log or config file is recognizable as this system's credential at a
/// glance, the same way `sk_live_`/`ghp_`-style prefixes work elsewhere.
const KEY_FIXED_PREFIX: &str = "aegis";

/// Number of random bytes making up a key's secret portion.
const KEY_SECRET_BYTES: usize = 32;

/// Length of the non-secret prefix shown in listings: the fixed prefix plus
/// the underscore and a handful of the secret's own leading hex chars, so
/// two keys issued back to back are still distinguishable in a UI without
/// exposing enough of the secret to matter.
const KEY_DISPLAY_PREFIX_LENGTH: usize = 12;

/// The scope vocabulary a restricted key may draw from. A key created with
/// no scope set is unrestricted.
pub const RECOGNIZED_SCOPES: &[&str] = &["read", "write", "admin"];

/// Repository port for API key persistence.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn create(&self, key: &ApiKey) -> AppResult<()>;

    /// Looks up a key by ID, scoped to the owning tenant and creator.
    async fn find_for_user(&self, tenant_id: TenantId, user_id: UserId, key_id: ApiKeyId) -> AppResult<Option<ApiKey>>;

    /// Looks up a key by its hash, for authenticating an incoming request.
    async fn find_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>>;

    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<ApiKey>>;

    async fn save(&self, key: &ApiKey) -> AppResult<()>;
}

/// An API key's raw secret, returned only once at creation time.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    pub key: ApiKey,
    /// The full bearer secret. Never persisted or retrievable again.
    pub raw_secret: String,
}

/// Application service for API key lifecycle management.
#[derive(Clone)]
pub struct ApiKeyService {
    repository: Arc<dyn ApiKeyRepository>,
}

impl ApiKeyService {
    /// Creates a new API key service.
    #[must_use]
    pub fn new(repository: Arc<dyn ApiKeyRepository>) -> Self {
        Self { repository }
    }

    /// Creates a new API key for a user, returning the one-time raw secret.
    ///
    /// `scopes` of `None` grants all permissions; a restricted set must
    /// draw only from [`RECOGNIZED_SCOPES`].
    pub async fn create_key(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        scopes: Option<Vec<String>>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedApiKey> {
        if let Some(scopes) = &scopes {
            for scope in scopes {
                if !RECOGNIZED_SCOPES.contains(&scope.as_str()) {
                    return Err(AppError::Validation(format!("unknown scope '{scope}'")));
                }
            }
        }

        let secret = generate_token(KEY_SECRET_BYTES);
        let raw_secret = format!("{KEY_FIXED_PREFIX}_{secret}");
        let prefix = raw_secret.chars().take(KEY_DISPLAY_PREFIX_LENGTH).collect();
        let key_hash = hash_token(&raw_secret);

        let key = ApiKey::new(tenant_id, user_id, key_hash, prefix, scopes, now, expires_at);
        self.repository.create(&key).await?;

        Ok(IssuedApiKey { key, raw_secret })
    }

    /// Authenticates an incoming request's bearer secret, returning the
    /// key record if it is active and grants the requested scope.
    pub async fn authenticate(&self, raw_secret: &str, requested_scope: &str, now: DateTime<Utc>) -> AppResult<ApiKey> {
        let key_hash = hash_token(raw_secret);
        let key = self
            .repository
            .find_by_hash(&key_hash)
            .await?
            .ok_or_else(|| AppError::Unauthorized("API key is invalid".to_owned()))?;

        if !key.is_active(now) {
            return Err(AppError::Unauthorized("API key is invalid".to_owned()));
        }
        if !key.allows_scope(requested_scope) {
            return Err(AppError::Forbidden("API key does not grant the requested scope".to_owned()));
        }

        Ok(key)
    }

    /// Lists all API keys belonging to a user.
    pub async fn list_keys(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<ApiKey>> {
        self.repository.list_for_user(tenant_id, user_id).await
    }

    /// Revokes an API key owned by the caller.
    pub async fn revoke_key(&self, tenant_id: TenantId, user_id: UserId, key_id: ApiKeyId, now: DateTime<Utc>) -> AppResult<()> {
        let mut key = self
            .repository
            .find_for_user(tenant_id, user_id, key_id)
            .await?
            .ok_or_else(|| AppError::NotFound("API key not found".to_owned()))?;

        key.revoke(now);
        self.repository.save(&key).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FakeRepository {
        keys: Mutex<Vec<ApiKey>>,
    }

    #[async_trait]
    impl ApiKeyRepository for FakeRepository {
        async fn create(&self, key: &ApiKey) -> AppResult<()> {
            self.keys.lock().unwrap_or_else(|poison| poison.into_inner()).push(key.clone());
            Ok(())
        }

        async fn find_for_user(&self, tenant_id: TenantId, user_id: UserId, key_id: ApiKeyId) -> AppResult<Option<ApiKey>> {
            Ok(self
                .keys
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .iter()
                .find(|key| key.tenant_id() == tenant_id && key.created_by() == user_id && key.id() == key_id)
                .cloned())
        }

        async fn find_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>> {
            Ok(self.keys.lock().unwrap_or_else(|poison| poison.into_inner()).iter().find(|key| key.key_hash() == key_hash).cloned())
        }

        async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<ApiKey>> {
            Ok(self
                .keys
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .iter()
                .filter(|key| key.tenant_id() == tenant_id && key.created_by() == user_id)
                .cloned()
                .collect())
        }

        async fn save(&self, key: &ApiKey) -> AppResult<()> {
            let mut keys = self.keys.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(existing) = keys.iter_mut().find(|existing| existing.id() == key.id()) {
                *existing = key.clone();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn created_key_authenticates_with_its_raw_secret() {
        let service = ApiKeyService::new(Arc::new(FakeRepository { keys: Mutex::new(Vec::new()) }));
        let now = Utc::now();
        let issued = service.create_key(TenantId::new(), UserId::new(), None, None, now).await.unwrap_or_else(|_| panic!("test"));

        let authenticated = service.authenticate(&issued.raw_secret, "anything", now).await.unwrap_or_else(|_| panic!("test"));
        assert_eq!(authenticated.id(), issued.key.id());
    }

    #[tokio::test]
    async fn revoked_key_fails_authentication() {
        let service = ApiKeyService::new(Arc::new(FakeRepository { keys: Mutex::new(Vec::new()) }));
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let now = Utc::now();
        let issued = service.create_key(tenant_id, user_id, None, None, now).await.unwrap_or_else(|_| panic!("test"));

        service.revoke_key(tenant_id, user_id, issued.key.id(), now).await.unwrap_or_else(|_| panic!("test"));

        let result = service.authenticate(&issued.raw_secret, "anything", now).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn key_not_owned_is_reported_as_not_found() {
        let service = ApiKeyService::new(Arc::new(FakeRepository { keys: Mutex::new(Vec::new()) }));
        let tenant_id = TenantId::new();
        let owner = UserId::new();
        let attacker = UserId::new();
        let now = Utc::now();
        let issued = service.create_key(tenant_id, owner, None, None, now).await.unwrap_or_else(|_| panic!("test"));

        let result = service.revoke_key(tenant_id, attacker, issued.key.id(), now).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn scoped_key_rejects_other_scopes() {
        let service = ApiKeyService::new(Arc::new(FakeRepository { keys: Mutex::new(Vec::new()) }));
        let now = Utc::now();
        let issued = service
            .create_key(TenantId::new(), UserId::new(), Some(vec!["read".to_owned()]), None, now)
            .await
            .unwrap_or_else(|_| panic!("test"));

        let result = service.authenticate(&issued.raw_secret, "write", now).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn unknown_scope_is_rejected_at_creation() {
        let service = ApiKeyService::new(Arc::new(FakeRepository { keys: Mutex::new(Vec::new()) }));
        let now = Utc::now();

        let result = service
            .create_key(TenantId::new(), UserId::new(), Some(vec!["launch-missiles".to_owned()]), None, now)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
