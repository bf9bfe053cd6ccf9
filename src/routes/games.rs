use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{CreateGameRequest, GameListItem, GameView, ViewerQuery},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Room directory endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game).delete(delete_game))
}

/// List every room, oldest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    responses((status = 200, description = "Known games", body = [GameListItem]))
)]
pub async fn list_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GameListItem>>, AppError> {
    Ok(Json(room_service::list_games(&state).await?))
}

/// Open a new lobby.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameView),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameView>), AppError> {
    let view = room_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Fetch a game as the given viewer may see it.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Identifier of the game"), ViewerQuery),
    responses(
        (status = 200, description = "Game", body = GameView),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<GameView>, AppError> {
    let view = room_service::get_game(&state, id, query.viewer.as_deref()).await?;
    Ok(Json(view))
}

/// Delete a game; its event streams receive `game.deleted` and close.
#[utoipa::path(
    delete,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Identifier of the game to delete")),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    room_service::delete_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
