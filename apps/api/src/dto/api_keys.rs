use aegis_domain::ApiKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for API key creation.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    /// Scopes granted to the key; omitted means all permissions.
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One API key as listed to its owner. Only the short prefix is ever
/// readable after creation.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub prefix: String,
    pub scopes: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().as_uuid(),
            prefix: key.prefix().to_owned(),
            scopes: key.scopes().map(<[String]>::to_vec),
            created_at: key.created_at(),
            expires_at: key.expires_at(),
            revoked_at: key.revoked_at(),
        }
    }
}

/// Creation response carrying the full bearer secret, returned exactly once.
#[derive(Debug, Serialize)]
pub struct IssuedApiKeyResponse {
    pub id: Uuid,
    pub prefix: String,
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The raw key. Never persisted or retrievable again.
    pub api_key: String,
}
