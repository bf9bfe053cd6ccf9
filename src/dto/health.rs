use serde::Serialize;
use utoipa::ToSchema;

/// Whether requests can currently reach the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Configured storage backend (`memory`, `mongo` or `couch`).
    pub storage: String,
}

impl HealthResponse {
    pub fn new(degraded: bool, storage: impl Into<String>) -> Self {
        Self {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Ok
            },
            storage: storage.into(),
        }
    }
}
