use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        game::{GameView, GuessRequest, JoinRequest},
        validation::validate_identifier,
    },
    error::AppError,
    services::round_service,
    state::SharedState,
};

/// Roster and round intents. Every response is the game as seen by the acting
/// player, or by an anonymous viewer for host intents.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/players", post(join_roster))
        .route("/games/{id}/players/{player_id}", delete(leave_roster))
        .route("/games/{id}/round/assign", post(assign_roles))
        .route("/games/{id}/guesses", post(submit_guess))
        .route("/games/{id}/round/next", post(start_new_round))
        .route("/games/{id}/round/new-game", post(start_new_game))
}

/// Add a participant to the roster. Joining twice is a no-op.
#[utoipa::path(
    post,
    path = "/games/{id}/players",
    tag = "round",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Roster updated", body = GameView),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn join_roster(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(round_service::join_roster(&state, id, payload).await?))
}

/// Remove a participant. May decide the running round.
#[utoipa::path(
    delete,
    path = "/games/{id}/players/{player_id}",
    tag = "round",
    params(
        ("id" = Uuid, Path, description = "Identifier of the game"),
        ("player_id" = String, Path, description = "Participant leaving the game")
    ),
    responses(
        (status = 200, description = "Roster updated", body = GameView),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn leave_roster(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, String)>,
) -> Result<Json<GameView>, AppError> {
    validate_identifier(&player_id)
        .map_err(|err| AppError::BadRequest(format!("invalid player_id: {err}")))?;
    Ok(Json(
        round_service::leave_roster(&state, id, &player_id).await?,
    ))
}

/// Deal roles: from the lobby, or to recover a round that lost its killer.
#[utoipa::path(
    post,
    path = "/games/{id}/round/assign",
    tag = "round",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Roles dealt", body = GameView),
        (status = 400, description = "Empty roster"),
        (status = 409, description = "Not allowed in the current status")
    )
)]
pub async fn assign_roles(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(round_service::assign_roles(&state, id).await?))
}

/// Lock in a guess. The last missing guess decides the round.
#[utoipa::path(
    post,
    path = "/games/{id}/guesses",
    tag = "round",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = GameView),
        (status = 404, description = "Unknown player or game"),
        (status = 409, description = "Duplicate guess or no round running"),
        (status = 500, description = "Game state is corrupt; roles must be re-assigned")
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<GuessRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(round_service::submit_guess(&state, id, payload).await?))
}

/// Start the next round of the same game, keeping the scores.
#[utoipa::path(
    post,
    path = "/games/{id}/round/next",
    tag = "round",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Roles re-dealt", body = GameView),
        (status = 409, description = "The current round is not over")
    )
)]
pub async fn start_new_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(round_service::start_new_round(&state, id).await?))
}

/// Start a new game with the same roster and zeroed scores.
#[utoipa::path(
    post,
    path = "/games/{id}/round/new-game",
    tag = "round",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Roles re-dealt, scores reset", body = GameView),
        (status = 409, description = "The current round is not over")
    )
)]
pub async fn start_new_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(round_service::start_new_game(&state, id).await?))
}
