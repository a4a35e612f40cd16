use serde::Serialize;
use uuid::Uuid;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub redis: HealthDependencyStatus,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Generic message response for auth flows.
#[derive(Debug, Serialize)]
pub struct GenericMessageResponse {
    pub message: String,
}

/// The authenticated principal as seen by the client.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub session_id: Uuid,
}
