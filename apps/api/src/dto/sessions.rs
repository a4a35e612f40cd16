use aegis_domain::Session;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One session as listed to its owner.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub absolute_expiry: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Whether this is the session the request was authenticated with.
    pub current: bool,
}

impl SessionResponse {
    pub fn from_session(session: &Session, current_session_id: Uuid) -> Self {
        Self {
            id: session.id().as_uuid(),
            created_at: session.created_at(),
            last_seen_at: session.last_seen_at(),
            ip_address: session.ip_address().map(str::to_owned),
            user_agent: session.user_agent().map(str::to_owned),
            absolute_expiry: session.absolute_expiry(),
            revoked_at: session.revoked_at(),
            current: session.id().as_uuid() == current_session_id,
        }
    }
}
