use tracing::warn;

use crate::{config::StorageBackend, dto::health::HealthResponse, state::SharedState};

/// Report whether storage is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let storage = match state.config().storage {
        StorageBackend::Memory => "memory",
        StorageBackend::Mongo => "mongo",
        StorageBackend::Couch => "couch",
    };
    HealthResponse::new(state.is_degraded().await, storage)
}
