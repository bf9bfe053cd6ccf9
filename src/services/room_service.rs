use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::game::{CreateGameRequest, GameListItem, GameView},
    error::ServiceError,
    state::{SharedState, game::Game},
};

/// Open an empty lobby, naming it after the current time when no name is given.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameView, ServiceError> {
    let store = state.require_game_store().await?;

    let name = request
        .name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(default_room_name);

    let game = Game::new(name, request.created_by);
    store.create_game(game.clone().into()).await?;

    info!(game_id = %game.id, name = game.name.as_str(), "game created");
    Ok(GameView::for_viewer(&game, None))
}

/// Every stored game, oldest first.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameListItem>, ServiceError> {
    let store = state.require_game_store().await?;
    let games = store.list_games().await?;
    Ok(games.into_iter().map(Into::into).collect())
}

/// Load one game as `viewer` may see it.
pub async fn get_game(
    state: &SharedState,
    id: Uuid,
    viewer: Option<&str>,
) -> Result<GameView, ServiceError> {
    let game = load_game(state, id).await?;
    Ok(GameView::for_viewer(&game, viewer))
}

/// Load the current state of a game.
pub async fn load_game(state: &SharedState, id: Uuid) -> Result<Game, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_game(id)
        .await?
        .map(|versioned| versioned.value.into())
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}`")))
}

/// Remove a game and tell its subscribers it is gone.
pub async fn delete_game(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_game_store().await?;
    if !store.delete_game(id).await? {
        return Err(ServiceError::NotFound(format!("game `{id}`")));
    }

    state.game_hubs().close(id);
    info!(game_id = %id, "game deleted");
    Ok(())
}

fn default_room_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("Game Room {millis}")
}
