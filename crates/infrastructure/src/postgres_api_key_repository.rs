//! PostgreSQL-backed API key repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use aegis_application::ApiKeyRepository;
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{ApiKey, ApiKeyId, UserId};

/// PostgreSQL implementation of the API key repository port.
#[derive(Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    tenant_id: Uuid,
    created_by: Uuid,
    key_hash: String,
    prefix: String,
    scopes: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        ApiKey::from_parts(
            ApiKeyId::from_uuid(row.id),
            TenantId::from_uuid(row.tenant_id),
            UserId::from_uuid(row.created_by),
            row.key_hash,
            row.prefix,
            row.scopes,
            row.created_at,
            row.expires_at,
            row.revoked_at,
        )
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn create(&self, key: &ApiKey) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, tenant_id, created_by, key_hash, prefix, scopes,
                created_at, expires_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(key.id().as_uuid())
        .bind(key.tenant_id().as_uuid())
        .bind(key.created_by().as_uuid())
        .bind(key.key_hash())
        .bind(key.prefix())
        .bind(key.scopes())
        .bind(key.created_at())
        .bind(key.expires_at())
        .bind(key.revoked_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create API key: {error}")))?;

        Ok(())
    }

    async fn find_for_user(&self, tenant_id: TenantId, user_id: UserId, key_id: ApiKeyId) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, tenant_id, created_by, key_hash, prefix, scopes, created_at, expires_at, revoked_at
            FROM api_keys
            WHERE id = $1 AND tenant_id = $2 AND created_by = $3
            "#,
        )
        .bind(key_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up API key: {error}")))?;

        Ok(row.map(ApiKey::from))
    }

    async fn find_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, tenant_id, created_by, key_hash, prefix, scopes, created_at, expires_at, revoked_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up API key by hash: {error}")))?;

        Ok(row.map(ApiKey::from))
    }

    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, tenant_id, created_by, key_hash, prefix, scopes, created_at, expires_at, revoked_at
            FROM api_keys
            WHERE tenant_id = $1 AND created_by = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list API keys: {error}")))?;

        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    async fn save(&self, key: &ApiKey) -> AppResult<()> {
        sqlx::query("UPDATE api_keys SET revoked_at = $2 WHERE id = $1")
            .bind(key.id().as_uuid())
            .bind(key.revoked_at())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to save API key: {error}")))?;

        Ok(())
    }
}
