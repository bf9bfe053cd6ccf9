use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{dao::storage::StorageError, state::round::RoundError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The round engine rejected the intent.
    #[error(transparent)]
    Round(#[from] RoundError),
    /// Every commit attempt lost the race against a concurrent writer.
    #[error("game `{0}` is changing too fast; try again")]
    Contention(uuid::Uuid),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ServiceError::NotFound(format!("game `{id}`")),
            StorageError::Conflict { id } => ServiceError::Contention(id),
            unavailable @ StorageError::Unavailable { .. } => ServiceError::Unavailable(unavailable),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Rejection from the round engine, reported with its code.
    #[error(transparent)]
    Round(RoundError),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Round(round) => AppError::Round(round),
            contention @ ServiceError::Contention(_) => AppError::Conflict(contention.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: String,
}

fn round_status(err: &RoundError) -> StatusCode {
    match err {
        RoundError::InvalidState(_) | RoundError::DuplicateGuess { .. } => StatusCode::CONFLICT,
        RoundError::UnknownPlayer { .. } => StatusCode::NOT_FOUND,
        RoundError::EmptyRoster => StatusCode::BAD_REQUEST,
        RoundError::CorruptState(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, Some("contention")),
            AppError::Round(err) => (round_status(err), Some(err.code())),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
        };

        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }

        let payload = Json(ErrorBody {
            code,
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{GameStatus, InvalidTransition, RoundEvent};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn engine_rejections_map_to_their_statuses() {
        let invalid = RoundError::InvalidState(InvalidTransition {
            from: GameStatus::Lobby,
            event: RoundEvent::SubmitGuess,
        });
        assert_eq!(status_of(invalid.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(
                RoundError::DuplicateGuess {
                    player_id: "a".into()
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                RoundError::UnknownPlayer {
                    player_id: "z".into()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RoundError::EmptyRoster.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RoundError::CorruptState("no killer".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_outcomes_map_to_service_errors() {
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            ServiceError::from(StorageError::NotFound { id }),
            ServiceError::NotFound(_)
        ));
        assert_eq!(
            status_of(StorageError::Conflict { id }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }
}
